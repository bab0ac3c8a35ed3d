use super::{IsRetryable, is_transient_transport};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde_json::Value;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum OauthError {
    #[error("OAuth flow error: {message}")]
    Flow {
        code: String,
        message: String,
        details: Option<Value>,
    },

    #[error("OAuth2 request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The identity provider rejected the grant; `body` is its error payload.
    #[error("OAuth2 server response error: {body}")]
    ServerResponse { error: String, body: String },

    #[error("OAuth2 token endpoint parse error: {message}. Body: {body}")]
    Parse { message: String, body: String },

    #[error("OAuth2 unexpected error: {message}")]
    Other { message: String },
}

impl IsRetryable for OauthError {
    fn is_retryable(&self) -> bool {
        match self {
            OauthError::Request(e) => is_transient_transport(e),
            // RFC 6749 codes a provider uses when it is overloaded or failing.
            OauthError::ServerResponse { error, .. } => {
                matches!(error.as_str(), "temporarily_unavailable" | "server_error")
            }
            // Gateways answer 5xx with HTML, which surfaces as a parse failure.
            OauthError::Parse { .. } => true,
            OauthError::Flow { .. } | OauthError::Other { .. } => false,
        }
    }
}

type PkgsRequestTokenError = RequestTokenError<
    HttpClientError<ReqwestClientError>,
    StandardErrorResponse<BasicErrorResponseType>,
>;

impl From<PkgsRequestTokenError> for OauthError {
    fn from(e: PkgsRequestTokenError) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                let body = serde_json::to_string(&err).unwrap_or_else(|_| err.to_string());
                OauthError::ServerResponse {
                    error: err.error().to_string(),
                    body,
                }
            }
            RequestTokenError::Request(wrapper) => match wrapper {
                HttpClientError::Reqwest(real_err) => OauthError::Request(*real_err),
                other => OauthError::Other {
                    message: format!("HttpClientError: {other:?}"),
                },
            },
            RequestTokenError::Parse(parse_err, body) => {
                let body_str = String::from_utf8_lossy(&body);
                let body = body_str
                    .char_indices()
                    .nth(300)
                    .map(|(idx, _)| format!("{}...<truncated>", &body_str[..idx]))
                    .unwrap_or_else(|| body_str.into_owned());
                OauthError::Parse {
                    message: parse_err.to_string(),
                    body,
                }
            }
            RequestTokenError::Other(s) => OauthError::Other { message: s },
        }
    }
}

impl From<PkgsRequestTokenError> for super::AdsError {
    fn from(e: PkgsRequestTokenError) -> Self {
        OauthError::from(e).into()
    }
}
