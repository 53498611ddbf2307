// handlers/elevated/admin.rs - routes open to admin and super_admin

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::database::models::UserResponse;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::policy::{Role, RoleFilter};
use crate::services::{
    BulkUserAction, Dashboard, PasswordResetRequest, RoleUpdateRequest, UserCreate, UserUpdate,
};
use crate::AppState;

/// POST /users/admin/create-user
pub async fn create_user(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(req): Json<UserCreate>,
) -> ApiResult<UserResponse> {
    let user = state.users.create_user_by_admin(&actor, req).await?;
    Ok(ApiResponse::created(user))
}

/// GET /users/admin/standard-users
pub async fn standard_users(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> ApiResult<Vec<UserResponse>> {
    let users = state
        .users
        .users_by_role(&actor, RoleFilter::Only(Role::StandardUser))
        .await?;
    Ok(ApiResponse::success(users))
}

/// GET /users/admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> ApiResult<Dashboard> {
    Ok(ApiResponse::success(state.users.dashboard(&actor).await?))
}

/// POST /users/admin/bulk-action - returns only the users that changed
pub async fn bulk_action(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(req): Json<BulkUserAction>,
) -> ApiResult<Vec<UserResponse>> {
    let users = state.users.bulk_user_action(&actor, req).await?;
    Ok(ApiResponse::success(users))
}

/// PUT /users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<UserResponse> {
    let user = state.users.update_user_by_admin(&actor, user_id, update).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /users/:id/role - admins pass the route gate but the service only
/// lets super_admin through
pub async fn change_role(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<RoleUpdateRequest>,
) -> ApiResult<UserResponse> {
    let user = state
        .users
        .change_user_role(&actor, user_id, &req.new_role)
        .await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /users/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserResponse> {
    Ok(ApiResponse::success(state.users.deactivate_user(&actor, user_id).await?))
}

/// PATCH /users/:id/activate
pub async fn activate(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserResponse> {
    Ok(ApiResponse::success(state.users.activate_user(&actor, user_id).await?))
}

/// POST /users/:id/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<UserResponse> {
    let user = state
        .users
        .reset_user_password(&actor, user_id, &req.new_password)
        .await?;
    Ok(ApiResponse::success(user))
}
