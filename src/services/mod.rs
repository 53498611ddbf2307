pub mod profile_pic;
pub mod user_service;

pub use profile_pic::{ProfilePicStore, StorageError};
pub use user_service::{
    BulkAction, BulkUserAction, Dashboard, LoginRequest, PasswordResetRequest, ProfileUpdate,
    RoleUpdateRequest, UserCreate, UserService, UserUpdate,
};
