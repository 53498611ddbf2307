use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::auth::validators::normalize_email;
use crate::middleware::{ApiResponse, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckEmailQuery {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EmailAvailability {
    pub email: String,
    pub available: bool,
}

/// GET /auth/check-email?email=
pub async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<CheckEmailQuery>,
) -> ApiResult<EmailAvailability> {
    let available = state.users.email_available(&query.email).await?;
    Ok(ApiResponse::success(EmailAvailability {
        email: normalize_email(&query.email),
        available,
    }))
}
