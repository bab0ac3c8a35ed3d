use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ingestion and manager-resolution tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Max retries (after the first attempt) for retryable upstream failures.
    /// TOML: `ingest.max_retries`. Default: `3`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay; attempt `n` waits `base_delay_ms * 2^n` plus jitter.
    /// TOML: `ingest.base_delay_ms`. Default: `1000`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to each delay.
    /// TOML: `ingest.max_jitter_ms`. Default: `1000`.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,

    /// Fixed pause between consecutive accounts in the daily batch.
    /// TOML: `ingest.inter_account_delay_ms`. Default: `500`.
    #[serde(default = "default_inter_account_delay_ms")]
    pub inter_account_delay_ms: u64,

    /// How long a manager-account binding (positive or negative) is trusted.
    /// TOML: `ingest.binding_ttl_hours`. Default: `24`.
    #[serde(default = "default_binding_ttl_hours")]
    pub binding_ttl_hours: i64,

    /// Fail ingestion when no manager account manages the customer.
    /// TOML: `ingest.require_manager`. Default: `false` (proceed without `login-customer-id`).
    #[serde(default)]
    pub require_manager: bool,

    /// Days ingested by `POST /ingest` when no dates are given (window ends yesterday).
    /// TOML: `ingest.default_lookback_days`. Default: `30`.
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: i64,
}

impl IngestConfig {
    pub fn binding_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.binding_ttl_hours.max(0))
    }

    pub fn inter_account_delay(&self) -> Duration {
        Duration::from_millis(self.inter_account_delay_ms)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            inter_account_delay_ms: default_inter_account_delay_ms(),
            binding_ttl_hours: default_binding_ttl_hours(),
            require_manager: false,
            default_lookback_days: default_lookback_days(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

fn default_inter_account_delay_ms() -> u64 {
    500
}

fn default_binding_ttl_hours() -> i64 {
    24
}

fn default_lookback_days() -> i64 {
    30
}
