use axum::{extract::State, Extension, Json};

use crate::database::models::UserResponse;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::policy::{Role, RoleFilter};
use crate::services::UserCreate;
use crate::AppState;

/// GET /users/super-admin/all-users
pub async fn all_users(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> ApiResult<Vec<UserResponse>> {
    let users = state.users.users_by_role(&actor, RoleFilter::All).await?;
    Ok(ApiResponse::success(users))
}

/// GET /users/super-admin/admins
pub async fn admins(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> ApiResult<Vec<UserResponse>> {
    let users = state
        .users
        .users_by_role(&actor, RoleFilter::Only(Role::Admin))
        .await?;
    Ok(ApiResponse::success(users))
}

/// POST /users/super-admin/create-admin - the payload's role is ignored
pub async fn create_admin(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(req): Json<UserCreate>,
) -> ApiResult<UserResponse> {
    let user = state.users.create_admin(&actor, req).await?;
    Ok(ApiResponse::created(user))
}
