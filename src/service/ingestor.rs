use super::backoff::{BackoffPolicy, with_backoff};
use super::mcc_resolver::{ManagerPolicy, MccResolver};
use super::token_refresher::TokenRefresher;
use super::transform::{campaign_metrics_query, to_metric_rows};
use crate::db::{DbActorHandle, IngestionCreate, IngestionFinish, IngestionStatus, UpsertCounts};
use crate::error::AdsError;
use crate::google_ads::{CustomerId, GoogleAdsApi};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info, warn};

/// A completed single-account ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSuccess {
    pub ingestion_id: i64,
    pub inserted: u64,
    pub updated: u64,
    pub records_processed: u64,
    pub retries: u32,
}

/// Per-account line of a batch report. Customer ids are masked.
#[derive(Debug, Clone, Serialize)]
pub struct AccountResult {
    pub customer_id: String,
    pub user_id: String,
    pub success: bool,
    pub inserted: u64,
    pub updated: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_accounts: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_inserted: u64,
    pub total_updated: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub results: Vec<AccountResult>,
}

impl BatchReport {
    /// True only when there was at least one account and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.summary.total_accounts > 0 && self.summary.successful == 0
    }

    fn push(&mut self, result: AccountResult) {
        self.summary.total_accounts += 1;
        if result.success {
            self.summary.successful += 1;
        } else {
            self.summary.failed += 1;
        }
        self.summary.total_inserted += result.inserted;
        self.summary.total_updated += result.updated;
        self.results.push(result);
    }
}

/// Pulls daily campaign metrics for customers into `campaign_metrics`, keeping an
/// `ingestion_runs` audit row per attempt.
#[derive(Clone)]
pub struct MetricsIngestor {
    db: DbActorHandle,
    refresher: TokenRefresher,
    resolver: MccResolver,
    api: GoogleAdsApi,
    policy: BackoffPolicy,
    manager_policy: ManagerPolicy,
    inter_account_delay: Duration,
}

impl MetricsIngestor {
    pub fn new(
        db: DbActorHandle,
        refresher: TokenRefresher,
        resolver: MccResolver,
        api: GoogleAdsApi,
        policy: BackoffPolicy,
        manager_policy: ManagerPolicy,
        inter_account_delay: Duration,
    ) -> Self {
        Self {
            db,
            refresher,
            resolver,
            api,
            policy,
            manager_policy,
            inter_account_delay,
        }
    }

    /// Ingests `[start, end]` for one customer. The audit row always ends up
    /// `completed` or `failed`.
    pub async fn ingest_customer(
        &self,
        customer: &CustomerId,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IngestSuccess, AdsError> {
        let ingestion_id = self
            .db
            .create_ingestion(IngestionCreate {
                user_id: user_id.to_string(),
                customer_id: customer.as_str().to_string(),
                start_date: start,
                end_date: end,
            })
            .await?;

        match self.run(customer, user_id, start, end).await {
            Ok((counts, retries)) => {
                let records_processed = counts.inserted + counts.updated;
                self.db
                    .finish_ingestion(IngestionFinish {
                        id: ingestion_id,
                        status: IngestionStatus::Completed,
                        records_processed: i64::try_from(records_processed).unwrap_or(i64::MAX),
                        error_message: None,
                    })
                    .await?;
                info!(
                    customer_id = %customer.masked(),
                    ingestion_id,
                    inserted = counts.inserted,
                    updated = counts.updated,
                    retries,
                    "Ingestion completed"
                );
                Ok(IngestSuccess {
                    ingestion_id,
                    inserted: counts.inserted,
                    updated: counts.updated,
                    records_processed,
                    retries,
                })
            }
            Err(e) => {
                if let Err(finish_err) = self
                    .db
                    .finish_ingestion(IngestionFinish {
                        id: ingestion_id,
                        status: IngestionStatus::Failed,
                        records_processed: 0,
                        error_message: Some(e.to_string()),
                    })
                    .await
                {
                    error!(ingestion_id, error = %finish_err, "Failed to record ingestion failure");
                }
                warn!(
                    customer_id = %customer.masked(),
                    ingestion_id,
                    error = %e,
                    "Ingestion failed"
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        customer: &CustomerId,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(UpsertCounts, u32), AdsError> {
        let login = self
            .resolver
            .login_customer_for(user_id, customer, self.manager_policy)
            .await?;
        let access_token = self.refresher.get_valid_access_token(user_id, None).await?;
        let query = campaign_metrics_query(start, end);

        let api = &self.api;
        let db = &self.db;
        let token = access_token.as_str();
        let query = query.as_str();
        let login = login.as_ref();

        let outcome = with_backoff(self.policy, "campaign metrics ingest", || async move {
            let rows = api.search_all(token, customer, login, query).await?;
            db.upsert_metrics(to_metric_rows(customer, rows)).await
        })
        .await;

        outcome.result.map(|counts| (counts, outcome.retries))
    }

    /// Ingests `date` for every client account with a stored token, one account at a
    /// time. A failing account is recorded and the batch moves on.
    pub async fn ingest_daily(&self, date: NaiveDate) -> Result<BatchReport, AdsError> {
        let accounts = self.db.list_ingestable_accounts().await?;
        let mut seen = HashSet::new();
        let mut report = BatchReport::default();

        for account in accounts {
            if !seen.insert(account.customer_id.clone()) {
                continue;
            }
            if report.summary.total_accounts > 0 && !self.inter_account_delay.is_zero() {
                tokio::time::sleep(self.inter_account_delay).await;
            }

            let result = match CustomerId::parse(&account.customer_id) {
                Ok(customer) => {
                    match self
                        .ingest_customer(&customer, &account.user_id, date, date)
                        .await
                    {
                        Ok(ok) => AccountResult {
                            customer_id: customer.masked().to_string(),
                            user_id: account.user_id,
                            success: true,
                            inserted: ok.inserted,
                            updated: ok.updated,
                            error: None,
                        },
                        Err(e) => AccountResult {
                            customer_id: customer.masked().to_string(),
                            user_id: account.user_id,
                            success: false,
                            inserted: 0,
                            updated: 0,
                            error: Some(e.to_string()),
                        },
                    }
                }
                Err(e) => AccountResult {
                    customer_id: crate::google_ads::customer_id::mask(&account.customer_id),
                    user_id: account.user_id,
                    success: false,
                    inserted: 0,
                    updated: 0,
                    error: Some(e.to_string()),
                },
            };
            report.push(result);
        }

        info!(
            date = %date,
            total_accounts = report.summary.total_accounts,
            successful = report.summary.successful,
            failed = report.summary.failed,
            total_inserted = report.summary.total_inserted,
            total_updated = report.summary.total_updated,
            "Daily ingestion finished"
        );
        Ok(report)
    }
}
