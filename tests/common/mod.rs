#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use rolegate::auth::{password, JwtService};
use rolegate::database::models::{NewUser, User};
use rolegate::database::{InMemoryUserRepository, UserRepository};
use rolegate::policy::Role;
use rolegate::services::{ProfilePicStore, UserService};
use rolegate::AppState;

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "Passw0rd1";

/// Router over an in-memory repository. Each test builds its own.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryUserRepository>,
    pub jwt: JwtService,
    pub pictures: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `error` message of a failure envelope.
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        let pictures = tempfile::tempdir().expect("create picture dir");
        let repo = Arc::new(InMemoryUserRepository::new());
        let jwt = JwtService::new(SECRET, 60);
        let service = UserService::new(
            repo.clone(),
            jwt.clone(),
            4,
            ProfilePicStore::new(pictures.path()),
        );

        Self {
            router: rolegate::app(AppState::new(service)),
            repo,
            jwt,
            pictures,
        }
    }

    pub async fn seed(&self, email: &str, role: Role) -> Result<User> {
        self.seed_with(email, role, true).await
    }

    pub async fn seed_with(&self, email: &str, role: Role, is_active: bool) -> Result<User> {
        let password_hash = password::hash_password(PASSWORD, 4)?;
        let user = self
            .repo
            .insert(NewUser {
                first_name: "Seed".to_string(),
                last_name: role.as_str().to_string(),
                email: email.to_string(),
                password_hash,
                contact_number: None,
                address: None,
                is_active,
                profile_pic: None,
                role,
            })
            .await
            .context("seed user")?;
        Ok(user)
    }

    pub fn token_for(&self, user: &User) -> String {
        self.jwt
            .issue(user.id, &user.email, user.role)
            .expect("issue token")
            .access_token
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.call(Method::PATCH, uri, token, None).await
    }
}
