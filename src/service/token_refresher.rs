use super::backoff::{BackoffPolicy, with_backoff};
use crate::config::GoogleAdsConfig;
use crate::db::{DbActorHandle, DbTokenRecord, TokenPatch};
use crate::error::AdsError;
use crate::google_ads::GoogleAdsOauth;
use chrono::{DateTime, Duration, Utc};
use oauth2::TokenResponse;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Hands out access tokens, refreshing them through the OAuth token endpoint when the
/// stored one is expired or about to be.
///
/// Token endpoint calls go through `policy`: 429, 5xx and transport failures are
/// retried, rejected grants are returned at once.
#[derive(Clone)]
pub struct TokenRefresher {
    db: DbActorHandle,
    cfg: Arc<GoogleAdsConfig>,
    http: reqwest::Client,
    policy: BackoffPolicy,
}

impl TokenRefresher {
    pub fn new(
        db: DbActorHandle,
        cfg: Arc<GoogleAdsConfig>,
        http: reqwest::Client,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            db,
            cfg,
            http,
            policy,
        }
    }

    pub async fn get_valid_access_token(
        &self,
        user_id: &str,
        company_id: Option<&str>,
    ) -> Result<String, AdsError> {
        Ok(self.get_valid_token(user_id, company_id).await?.access_token)
    }

    /// The stored record with a usable access token, refreshed and persisted if needed.
    pub async fn get_valid_token(
        &self,
        user_id: &str,
        company_id: Option<&str>,
    ) -> Result<DbTokenRecord, AdsError> {
        let record = self
            .db
            .get_token(user_id, company_id)
            .await?
            .ok_or_else(|| AdsError::TokenNotFound {
                user_id: user_id.to_string(),
            })?;

        let now = Utc::now();
        if !record.needs_refresh(now, self.cfg.expiry_buffer()) {
            debug!(user_id, token_id = record.id, "Stored access token still valid");
            return Ok(record);
        }

        self.refresh(record, now).await
    }

    async fn refresh(
        &self,
        mut record: DbTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<DbTokenRecord, AdsError> {
        let cfg = &self.cfg;
        let http = &self.http;
        let refresh_token = record.refresh_token.as_str();
        let outcome = with_backoff(self.policy, "token refresh", || {
            GoogleAdsOauth::refresh_access_token(cfg, refresh_token, http.clone())
        })
        .await;

        let response = outcome.result.inspect_err(|e| {
            warn!(
                user_id = %record.user_id,
                token_id = record.id,
                retries = outcome.retries,
                error = %e,
                "Google Ads token refresh failed"
            );
        })?;

        let expires_in = response
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_EXPIRES_IN_SECS));
        let access_token = response.access_token().secret().clone();
        let rotated_refresh = response.refresh_token().map(|t| t.secret().clone());
        let token_expiry = now + expires_in;

        self.db
            .patch_token(
                record.id,
                TokenPatch {
                    access_token: Some(access_token.clone()),
                    refresh_token: rotated_refresh.clone(),
                    token_expiry: Some(token_expiry),
                    login_customer_id: None,
                },
            )
            .await?;

        info!(
            user_id = %record.user_id,
            token_id = record.id,
            expires_in_secs = expires_in.num_seconds(),
            "Access token refreshed successfully"
        );

        record.access_token = access_token;
        record.token_expiry = token_expiry;
        if let Some(refresh_token) = rotated_refresh {
            record.refresh_token = refresh_token;
        }
        Ok(record)
    }
}
