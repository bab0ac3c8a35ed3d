use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbTokenRecord {
    pub id: i64,
    pub user_id: String,
    /// Empty string when the token is not tied to a company.
    pub company_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
    pub login_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbTokenRecord {
    pub fn company_id(&self) -> Option<&str> {
        Some(self.company_id.as_str()).filter(|c| !c.is_empty())
    }

    /// True once `now` is within `buffer` of expiry (inclusive).
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now + buffer >= self.token_expiry
    }
}

impl fmt::Debug for DbTokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbTokenRecord")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("company_id", &self.company_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_expiry", &self.token_expiry)
            .field(
                "login_customer_id",
                &self.login_customer_id.as_deref().map(crate::google_ads::customer_id::mask),
            )
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Manager,
    Client,
}

impl AccountType {
    pub fn from_manager_flag(manager: bool) -> Self {
        if manager {
            AccountType::Manager
        } else {
            AccountType::Client
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAdAccount {
    pub id: i64,
    pub user_id: String,
    pub customer_id: String,
    pub descriptive_name: Option<String>,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAccountBinding {
    pub id: i64,
    pub user_id: String,
    pub customer_id: String,
    /// Empty string means "no manager account manages this customer".
    pub resolved_login_customer_id: String,
    pub last_verified_at: DateTime<Utc>,
}

impl DbAccountBinding {
    /// Trusted only while `last_verified_at` lies within `ttl` of `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.last_verified_at >= now - ttl
    }

    pub fn is_negative(&self) -> bool {
        self.resolved_login_customer_id.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbIngestionRecord {
    pub id: i64,
    pub user_id: String,
    pub customer_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: IngestionStatus,
    pub records_processed: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleAds,
}

/// One campaign's metrics for one day, keyed by (customer, date, campaign, platform).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct MetricRow {
    pub customer_id: String,
    pub date: NaiveDate,
    pub campaign_id: String,
    pub platform: Platform,
    pub campaign_name: Option<String>,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: f64,
    pub conversions: f64,
    pub revenue: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub cpa: f64,
    pub roas: f64,
    pub conversion_rate: f64,
}
