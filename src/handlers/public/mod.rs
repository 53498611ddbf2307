// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service description, health check and token acquisition.

pub mod auth;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::AppState;

/// GET / - service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "rolegate",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "User accounts with role-based access control",
            "endpoints": {
                "auth": "/auth/signup, /auth/login, /auth/check-email (public)",
                "protected": "/protected (token only)",
                "profile": "/users/me, /users/me/profile-pic, /users/search (authenticated)",
                "admin": "/users/admin/*, /users/:id/* (admin, super_admin)",
                "super_admin": "/users/super-admin/* (super_admin)",
            }
        }
    }))
}

/// GET /health - storage ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.users.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
