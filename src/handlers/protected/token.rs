use axum::Extension;
use serde::Serialize;

use crate::auth::Claims;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub message: &'static str,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub expires_at: i64,
}

/// GET /protected - echoes the validated claims without a user lookup
pub async fn protected_route(Extension(claims): Extension<Claims>) -> ApiResult<TokenInfo> {
    Ok(ApiResponse::success(TokenInfo {
        message: "Access granted",
        user_id: claims.sub,
        role: claims.role,
        email: claims.email,
        expires_at: claims.exp,
    }))
}
