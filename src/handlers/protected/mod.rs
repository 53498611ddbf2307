// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// `token` only needs a valid token (`require_token`); the rest run behind
// `require_auth` and receive the active `CurrentUser`.

pub mod profile;
pub mod search;
pub mod token;

pub use profile::{get_me, update_me, upload_profile_pic};
pub use search::search_users;
pub use token::protected_route;
