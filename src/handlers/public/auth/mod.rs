// handlers/public/auth/mod.rs - Public authentication handlers
//
// Token acquisition and account registration. No user context is available,
// so every input is validated by the service.

pub mod check_email;
pub mod login;
pub mod signup;

pub use check_email::check_email;
pub use login::login;
pub use signup::signup;
