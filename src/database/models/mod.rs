pub mod user;

pub use user::{NewUser, User, UserChanges, UserMinimal, UserResponse, UserRow};
