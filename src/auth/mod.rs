pub mod password;
pub mod validators;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::Role;

/// Token payload. `sub` is the user id as a decimal string.
///
/// `sub` and `role` are optional so a well-signed token that lacks them can
/// be told apart from a forged one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing or invalid authorization header")]
    MissingCredentials,
    #[error("Token is required")]
    TokenRequired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token: missing user ID")]
    MissingSubject,
    #[error("Invalid user ID format")]
    InvalidSubject,
    #[error("JWT secret not configured")]
    InvalidSecret,
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Issues and validates HS256 access tokens.
#[derive(Clone)]
pub struct JwtService {
    secret: String,
    expiry_minutes: i64,
}

impl JwtService {
    pub fn new(secret: impl Into<String>, expiry_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            expiry_minutes,
        }
    }

    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self::new(config.security.jwt_secret.clone(), config.security.jwt_expiry_minutes)
    }

    pub fn issue(&self, user_id: i64, email: &str, role: Role) -> Result<IssuedToken, AuthError> {
        let out_of_range =
            || AuthError::TokenGeneration(format!("expiry of {} minutes is out of range", self.expiry_minutes));

        let now = Utc::now();
        let expires_at = Duration::try_minutes(self.expiry_minutes)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(out_of_range)?;
        let expires_in = self.expiry_minutes.checked_mul(60).ok_or_else(out_of_range)?;

        let claims = Claims {
            sub: Some(user_id.to_string()),
            role: Some(role.as_str().to_string()),
            email: Some(email.to_string()),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        Ok(IssuedToken {
            access_token: self.encode(&claims)?,
            token_type: "bearer",
            expires_in,
        })
    }

    /// Sign arbitrary claims. Used by `issue` and by tests that need
    /// tokens with unusual payloads.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }

        let encoding_key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), claims, &encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::TokenRequired);
        }
        if self.secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?
            .claims;

        // Zero leeway in the library is inclusive of the current second.
        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        match claims.sub.as_deref() {
            Some(sub) if !sub.trim().is_empty() => Ok(claims),
            _ => Err(AuthError::MissingSubject),
        }
    }
}

impl Claims {
    pub fn subject_id(&self) -> Result<i64, AuthError> {
        self.sub
            .as_deref()
            .ok_or(AuthError::MissingSubject)?
            .trim()
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidSubject)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AuthError::MissingCredentials)?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::TokenRequired);
    }
    Ok(token)
}
