mod ads;
mod oauth;

pub use ads::{AdsError, ApiErrorBody};
pub use oauth::OauthError;

/// Classifies a failure as transient (worth retrying) or permanent.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

/// Transport-level failures (timeouts, resets, failed connects) are transient.
pub(crate) fn is_transient_transport(err: &reqwest::Error) -> bool {
    if let Some(status) = err.status() {
        return status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
    }
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}
