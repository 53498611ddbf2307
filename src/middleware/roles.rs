use axum::{extract::Request, middleware::Next, response::Response};
use tracing::warn;

use super::auth::CurrentUser;
use crate::error::ApiError;
use crate::policy::{self, Role};

const ADMINS: &[Role] = &[Role::Admin, Role::SuperAdmin];
const SUPER_ADMINS: &[Role] = &[Role::SuperAdmin];

fn gate(request: &Request, allowed: &[Role]) -> Result<(), ApiError> {
    let CurrentUser(user) = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    policy::require_any(user.role, allowed).map_err(|denial| {
        warn!("{} ({}) denied access to {}", user.email, user.role, request.uri().path());
        ApiError::from(denial)
    })
}

/// Must run after `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(&request, ADMINS)?;
    Ok(next.run(request).await)
}

/// Must run after `require_auth`.
pub async fn require_super_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(&request, SUPER_ADMINS)?;
    Ok(next.run(request).await)
}
