// handlers/public/auth/login.rs - POST /auth/login handler

use axum::{extract::State, Json};

use crate::auth::IssuedToken;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::LoginRequest;
use crate::AppState;

/// POST /auth/login - exchange credentials for an access token
///
/// ```json
/// { "email": "jane@example.com", "password": "Secret123" }
/// ```
///
/// Success:
/// ```json
/// {
///   "success": true,
///   "data": { "access_token": "eyJ...", "token_type": "bearer", "expires_in": 3600 }
/// }
/// ```
///
/// Unknown email and wrong password both answer 401 "Invalid credentials";
/// a deactivated account answers 401 "User account is deactivated".
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<IssuedToken> {
    let token = state.users.login(req).await?;
    Ok(ApiResponse::success(token))
}
