use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::oauth::OauthError;
use super::{IsRetryable, is_transient_transport};

#[derive(Debug, ThisError)]
pub enum AdsError {
    #[error("No Google Ads token stored for user {user_id}")]
    TokenNotFound { user_id: String },

    #[error(transparent)]
    Oauth(#[from] OauthError),

    /// Non-2xx answer from the Google Ads API. `body` is a truncated preview.
    #[error("Upstream error with status {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    /// No manager account manages the customer. Carries the masked id.
    #[error("No manager account manages customer {customer}")]
    NotManaged { customer: String },

    #[error("Invalid customer id: {0}")]
    InvalidCustomerId(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl AdsError {
    fn code_and_status(&self) -> (&'static str, StatusCode) {
        match self {
            AdsError::TokenNotFound { .. } => ("NO_TOKEN", StatusCode::NOT_FOUND),
            AdsError::NotManaged { .. } => ("NOT_MANAGED", StatusCode::NOT_FOUND),
            AdsError::InvalidCustomerId(_) | AdsError::BadRequest(_) => {
                ("BAD_REQUEST", StatusCode::BAD_REQUEST)
            }
            AdsError::Forbidden(_) => ("FORBIDDEN", StatusCode::FORBIDDEN),
            AdsError::Oauth(OauthError::Flow { .. }) => ("OAUTH_FLOW", StatusCode::FORBIDDEN),
            AdsError::Oauth(OauthError::Other { .. }) => {
                ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR)
            }
            AdsError::Oauth(_) => ("TOKEN_REFRESH_FAILED", StatusCode::BAD_GATEWAY),
            AdsError::UpstreamStatus { status, .. }
                if *status == StatusCode::TOO_MANY_REQUESTS =>
            {
                ("RATE_LIMIT", StatusCode::TOO_MANY_REQUESTS)
            }
            AdsError::UpstreamStatus { .. } | AdsError::ReqwestError(_) => {
                ("UPSTREAM_ERROR", StatusCode::BAD_GATEWAY)
            }
            AdsError::JsonError(_) => ("BAD_UPSTREAM_PAYLOAD", StatusCode::BAD_GATEWAY),
            AdsError::UrlError(_)
            | AdsError::DatabaseError(_)
            | AdsError::RactorError(_)
            | AdsError::UnexpectedError(_) => {
                ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for AdsError {
    fn into_response(self) -> axum::response::Response {
        let (code, status) = self.code_and_status();
        let (error, details) = match &self {
            // Internal failures are logged, not echoed.
            AdsError::DatabaseError(_) | AdsError::RactorError(_) | AdsError::UnexpectedError(_) => {
                tracing::error!(error = %self, "internal error while handling request");
                ("An internal server error occurred.".to_string(), None)
            }
            AdsError::UpstreamStatus { body, .. } => {
                (self.to_string(), Some(Value::String(body.clone())))
            }
            AdsError::Oauth(OauthError::Flow { details, .. }) => (self.to_string(), details.clone()),
            _ => (self.to_string(), None),
        };
        let body = ApiErrorBody {
            error,
            code: code.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// Error payload returned to operators and the frontend.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IsRetryable for AdsError {
    fn is_retryable(&self) -> bool {
        match self {
            AdsError::UpstreamStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            AdsError::ReqwestError(e) => is_transient_transport(e),
            AdsError::Oauth(e) => e.is_retryable(),
            _ => false,
        }
    }
}
