pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod policy;
pub mod services;

#[cfg(test)]
pub mod testing;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::UserRepository;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{require_admin, require_auth, require_super_admin, require_token};
use crate::services::UserService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
}

impl AppState {
    pub fn new(users: UserService) -> Self {
        Self { users }
    }

    pub fn from_repository(repo: Arc<dyn UserRepository>, config: &AppConfig) -> Self {
        Self::new(UserService::from_config(repo, config))
    }
}

/// Router using the process-wide configuration.
pub fn app(state: AppState) -> Router {
    build_router(state, config::config())
}

pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    let public_routes = Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/signup", post(public::auth::signup))
        .route("/auth/login", post(public::auth::login))
        .route("/auth/check-email", get(public::auth::check_email));

    let token_routes = Router::new()
        .route("/protected", get(protected::protected_route))
        .route_layer(from_fn_with_state(state.clone(), require_token));

    let user_routes = Router::new()
        .route("/users/me", get(protected::get_me).put(protected::update_me))
        .route("/users/me/profile-pic", post(protected::upload_profile_pic))
        .route("/users/search", get(protected::search_users))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/users/admin/create-user", post(elevated::admin::create_user))
        .route("/users/admin/standard-users", get(elevated::admin::standard_users))
        .route("/users/admin/dashboard", get(elevated::admin::dashboard))
        .route("/users/admin/bulk-action", post(elevated::admin::bulk_action))
        .route("/users/:id", put(elevated::admin::update_user))
        .route("/users/:id/role", put(elevated::admin::change_role))
        .route("/users/:id/deactivate", patch(elevated::admin::deactivate))
        .route("/users/:id/activate", patch(elevated::admin::activate))
        .route("/users/:id/reset-password", post(elevated::admin::reset_password))
        // Layers run bottom-up: authenticate, then gate on role.
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let super_admin_routes = Router::new()
        .route("/users/super-admin/all-users", get(elevated::super_admin::all_users))
        .route("/users/super-admin/admins", get(elevated::super_admin::admins))
        .route("/users/super-admin/create-admin", post(elevated::super_admin::create_admin))
        .route_layer(from_fn(require_super_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let router = Router::new()
        .merge(public_routes)
        .merge(token_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(super_admin_routes)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(config))
        .with_state(state);

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = &config.security.cors_origins;
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
