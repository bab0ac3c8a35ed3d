use super::backoff::{BackoffPolicy, with_backoff};
use super::token_refresher::TokenRefresher;
use crate::db::{BindingUpsert, DbActorHandle};
use crate::error::{AdsError, IsRetryable};
use crate::google_ads::{CustomerId, GoogleAdsApi};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of a manager lookup. `NotManaged` is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerResolution {
    Managed(CustomerId),
    NotManaged,
}

impl ManagerResolution {
    pub fn manager(&self) -> Option<&CustomerId> {
        match self {
            ManagerResolution::Managed(id) => Some(id),
            ManagerResolution::NotManaged => None,
        }
    }
}

/// What a caller does when no manager account manages the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerPolicy {
    /// Continue without a `login-customer-id` header.
    Optional,
    /// Fail with [`AdsError::NotManaged`].
    Required,
}

impl ManagerPolicy {
    pub fn from_flag(require_manager: bool) -> Self {
        if require_manager {
            ManagerPolicy::Required
        } else {
            ManagerPolicy::Optional
        }
    }
}

/// Finds which of a user's manager accounts manages a customer.
///
/// Results, negative ones included, are cached in `account_bindings` and trusted for
/// `ttl`. Candidates are probed in order and the first match wins: stored tokens'
/// `login_customer_id` (most recently updated first), then directory managers by id.
#[derive(Clone)]
pub struct MccResolver {
    db: DbActorHandle,
    refresher: TokenRefresher,
    api: GoogleAdsApi,
    ttl: Duration,
    probe_policy: BackoffPolicy,
}

impl MccResolver {
    pub fn new(
        db: DbActorHandle,
        refresher: TokenRefresher,
        api: GoogleAdsApi,
        ttl: Duration,
        probe_policy: BackoffPolicy,
    ) -> Self {
        Self {
            db,
            refresher,
            api,
            ttl,
            probe_policy,
        }
    }

    pub async fn resolve_manager_for(
        &self,
        user_id: &str,
        target: &CustomerId,
    ) -> Result<ManagerResolution, AdsError> {
        let now = Utc::now();
        if let Some(binding) = self.db.get_binding(user_id, target.as_str()).await? {
            if binding.is_fresh(now, self.ttl) {
                if binding.is_negative() {
                    debug!(customer_id = %target.masked(), "Manager cache hit (not managed)");
                    return Ok(ManagerResolution::NotManaged);
                }
                if let Ok(manager) = CustomerId::parse(&binding.resolved_login_customer_id) {
                    debug!(
                        customer_id = %target.masked(),
                        manager_id = %manager.masked(),
                        "Manager cache hit"
                    );
                    return Ok(ManagerResolution::Managed(manager));
                }
            }
        }

        let access_token = self.refresher.get_valid_access_token(user_id, None).await?;
        let candidates = self.candidates(user_id).await?;
        debug!(
            customer_id = %target.masked(),
            candidates = candidates.len(),
            "Probing manager accounts"
        );

        let mut transient: Option<AdsError> = None;
        for candidate in &candidates {
            let outcome = with_backoff(self.probe_policy, "manager probe", || {
                self.api.manages(&access_token, candidate, target)
            })
            .await;

            match outcome.result {
                Ok(true) => {
                    self.store(user_id, target, candidate.as_str()).await?;
                    info!(
                        customer_id = %target.masked(),
                        manager_id = %candidate.masked(),
                        "Resolved manager account"
                    );
                    return Ok(ManagerResolution::Managed(candidate.clone()));
                }
                Ok(false) => {}
                Err(e) if e.is_retryable() => {
                    warn!(
                        customer_id = %target.masked(),
                        manager_id = %candidate.masked(),
                        error = %e,
                        "Manager probe failed after retries"
                    );
                    transient = Some(e);
                }
                Err(e) => {
                    debug!(
                        customer_id = %target.masked(),
                        manager_id = %candidate.masked(),
                        error = %e,
                        "Manager probe rejected, treating as not managed"
                    );
                }
            }
        }

        // An unreachable upstream says nothing about the relationship, so nothing is cached.
        if let Some(e) = transient {
            return Err(e);
        }

        self.store(user_id, target, "").await?;
        info!(customer_id = %target.masked(), "No manager account manages customer");
        Ok(ManagerResolution::NotManaged)
    }

    /// Applies `policy` to a resolution: `Required` turns `NotManaged` into an error.
    pub async fn login_customer_for(
        &self,
        user_id: &str,
        target: &CustomerId,
        policy: ManagerPolicy,
    ) -> Result<Option<CustomerId>, AdsError> {
        match (self.resolve_manager_for(user_id, target).await?, policy) {
            (ManagerResolution::Managed(id), _) => Ok(Some(id)),
            (ManagerResolution::NotManaged, ManagerPolicy::Optional) => Ok(None),
            (ManagerResolution::NotManaged, ManagerPolicy::Required) => Err(AdsError::NotManaged {
                customer: target.masked().to_string(),
            }),
        }
    }

    async fn candidates(&self, user_id: &str) -> Result<Vec<CustomerId>, AdsError> {
        let from_tokens = self
            .db
            .list_tokens_for_user(user_id)
            .await?
            .into_iter()
            .filter_map(|t| t.login_customer_id);
        let from_directory = self
            .db
            .list_manager_accounts(user_id)
            .await?
            .into_iter()
            .map(|a| a.customer_id);

        let mut ordered: Vec<CustomerId> = Vec::new();
        for raw in from_tokens.chain(from_directory) {
            match CustomerId::parse(&raw) {
                Ok(id) if !ordered.contains(&id) => ordered.push(id),
                _ => {}
            }
        }
        Ok(ordered)
    }

    async fn store(
        &self,
        user_id: &str,
        target: &CustomerId,
        resolved: &str,
    ) -> Result<(), AdsError> {
        self.db
            .upsert_binding(BindingUpsert {
                user_id: user_id.to_string(),
                customer_id: target.as_str().to_string(),
                resolved_login_customer_id: resolved.to_string(),
                last_verified_at: Utc::now(),
            })
            .await
    }
}
