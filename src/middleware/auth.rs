use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::auth::{extract_bearer, Claims};
use crate::database::models::User;
use crate::error::ApiError;
use crate::AppState;

/// The authenticated, active user behind the request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

fn bearer_token(request: &Request) -> Result<String, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    extract_bearer(header).map(str::to_string).map_err(|e| {
        debug!("Rejected authorization header: {}", e);
        ApiError::from(e)
    })
}

fn validate(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    state.users.jwt().validate(token).map_err(|e| {
        warn!("Token rejected: {}", e);
        ApiError::from(e)
    })
}

/// Bearer token -> claims -> user lookup -> active check.
/// Inserts `CurrentUser` into the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)?;
    let claims = validate(&state, &token)?;
    let user_id = claims.subject_id()?;

    let user = state
        .users
        .repository()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| {
            warn!("Token subject {} does not exist", user_id);
            ApiError::unauthorized("User not found")
        })?;

    if !user.is_active {
        warn!("Inactive user {} presented a valid token", user.email);
        return Err(ApiError::forbidden("User account is inactive"));
    }

    debug!("Authenticated {} ({})", user.email, user.role);
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Token-only check: validates the bearer token without touching storage.
/// Inserts the validated `Claims`.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)?;
    let claims = validate(&state, &token)?;
    claims.subject_id()?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
