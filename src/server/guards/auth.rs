use crate::error::AdsError;
use crate::server::router::AdsState;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::debug;

const X_API_KEY: &str = "x-api-key";

/// Session token claims; `sub` is the user id.
#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
}

/// Who is calling: a scheduled job holding the shared key, or a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Internal,
    User { user_id: String },
}

impl Caller {
    /// The user id the request acts on.
    ///
    /// Users act on themselves (naming someone else is forbidden); internal callers must
    /// name the user.
    pub fn acting_user(&self, requested: Option<&str>) -> Result<String, AdsError> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        match (self, requested) {
            (Caller::User { user_id }, None) => Ok(user_id.clone()),
            (Caller::User { user_id }, Some(other)) if other == user_id => Ok(user_id.clone()),
            (Caller::User { .. }, Some(_)) => Err(AdsError::Forbidden(
                "cannot act on behalf of another user".to_string(),
            )),
            (Caller::Internal, Some(other)) => Ok(other.to_string()),
            (Caller::Internal, None) => Err(AdsError::BadRequest("user_id is required".to_string())),
        }
    }
}

fn key_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

fn verify_session(token: &str, state: &AdsState) -> Result<String, AuthError> {
    let basic = &state.cfg.basic;
    if basic.session_jwt_secret.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    match basic.session_jwt_audience.as_deref() {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(basic.session_jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!(error = %e, "Session token rejected");
        AuthError::InvalidToken
    })?;

    let sub = data.claims.sub.trim();
    if sub.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    Ok(sub.to_string())
}

impl FromRequestParts<AdsState> for Caller {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AdsState) -> Result<Self, Self::Rejection> {
        if let Some(key) = parts.headers.get(X_API_KEY).and_then(|v| v.to_str().ok()) {
            return if key_matches(key, &state.cfg.basic.ingest_key) {
                Ok(Caller::Internal)
            } else {
                Err(AuthError::InvalidKey)
            };
        }

        match parts.headers.typed_get::<Authorization<Bearer>>() {
            Some(auth) => verify_session(auth.token(), state).map(|user_id| Caller::User { user_id }),
            None => Err(AuthError::MissingCredentials),
        }
    }
}

/// Only the shared internal key is accepted.
#[derive(Debug, Clone, Copy)]
pub struct RequireInternalKey;

impl FromRequestParts<AdsState> for RequireInternalKey {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AdsState) -> Result<Self, Self::Rejection> {
        match parts.headers.get(X_API_KEY).and_then(|v| v.to_str().ok()) {
            Some(key) if key_matches(key, &state.cfg.basic.ingest_key) => Ok(RequireInternalKey),
            Some(_) => Err(AuthError::InvalidKey),
            None => Err(AuthError::MissingCredentials),
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidKey,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let reason = match self {
            AuthError::MissingCredentials => "Missing bearer token or API key",
            AuthError::InvalidKey => "Invalid API key",
            AuthError::InvalidToken => "Invalid session token",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": reason, "code": "UNAUTHORIZED" })),
        )
            .into_response()
    }
}
