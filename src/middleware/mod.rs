pub mod auth;
pub mod response;
pub mod roles;

pub use auth::{require_auth, require_token, CurrentUser};
pub use response::{ApiResponse, ApiResult};
pub use roles::{require_admin, require_super_admin};
