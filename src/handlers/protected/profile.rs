// handlers/protected/profile.rs - /users/me handlers

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use tracing::info;

use crate::database::models::UserResponse;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::ProfileUpdate;
use crate::AppState;

/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<UserResponse> {
    info!("User {} read their profile", user.email);
    Ok(ApiResponse::success(state.users.profile(&user)))
}

/// PUT /users/me - self-service update. Activation and role are not part
/// of the accepted payload.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<UserResponse> {
    let updated = state.users.update_profile(&user, update).await?;
    Ok(ApiResponse::success(updated))
}

/// POST /users/me/profile-pic - multipart upload, field `file`
pub async fn upload_profile_pic(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<UserResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        let updated = state
            .users
            .upload_profile_pic(&user, content_type.as_deref(), filename.as_deref(), &bytes)
            .await?;
        return Ok(ApiResponse::success(updated));
    }

    Err(ApiError::field("file", "File is required"))
}
