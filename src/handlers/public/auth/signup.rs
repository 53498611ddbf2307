// handlers/public/auth/signup.rs - POST /auth/signup handler

use axum::{extract::State, Json};

use crate::database::models::UserResponse;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserCreate;
use crate::AppState;

/// POST /auth/signup - register a standard user
///
/// `role` and `is_active` in the payload are ignored. `profile_pic` may be a
/// `data:image/...;base64,` URL, which is stored and replaced by its path.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<UserCreate>,
) -> ApiResult<UserResponse> {
    let user = state.users.signup(req).await?;
    Ok(ApiResponse::created(user))
}
