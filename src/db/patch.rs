use super::models::{AccountType, IngestionStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Token record written by the OAuth callback; upserts on (user_id, company_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCreate {
    pub user_id: String,
    pub company_id: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
    pub login_customer_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenPatch {
    /// `None` => do not change; `Some(v)` => update
    pub access_token: Option<String>,
    /// `None` => do not change; `Some(v)` => update
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    /// `None` => do not change; `Some(v)` => update
    pub login_customer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdAccountUpsert {
    pub user_id: String,
    pub customer_id: String,
    pub descriptive_name: Option<String>,
    pub account_type: AccountType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingUpsert {
    pub user_id: String,
    pub customer_id: String,
    /// Empty string records a negative result.
    pub resolved_login_customer_id: String,
    pub last_verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionCreate {
    pub user_id: String,
    pub customer_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionFinish {
    pub id: i64,
    pub status: IngestionStatus,
    pub records_processed: i64,
    pub error_message: Option<String>,
}

/// Outcome of a metrics upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}
