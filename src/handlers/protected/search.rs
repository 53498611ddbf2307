use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use crate::database::models::UserMinimal;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub email: Option<String>,
}

/// GET /users/search?email= - case-insensitive substring match, limited to
/// what the caller's role may see
pub async fn search_users(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<UserMinimal>> {
    let users = state.users.search_users(&user, query.email.as_deref()).await?;
    Ok(ApiResponse::success(users))
}
