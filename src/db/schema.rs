//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `oauth_tokens` (one token record per (user, company), empty company = none)
/// - `ad_accounts` (accounts directory: manager vs client accounts per user)
/// - `account_bindings` (manager resolution cache, empty login id = not managed)
/// - `ingestion_runs` (audit trail of ingestion attempts)
/// - `campaign_metrics` (daily campaign metrics, one row per customer/date/campaign/platform)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- OAuth tokens
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS oauth_tokens (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    company_id TEXT NOT NULL DEFAULT '',
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    token_expiry TEXT NOT NULL, -- RFC3339
    login_customer_id TEXT NULL,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL, -- RFC3339
    UNIQUE(user_id, company_id)
);

-- ---------------------------------------------------------------------------
-- Accounts directory
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS ad_accounts (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    descriptive_name TEXT NULL,
    account_type TEXT NOT NULL, -- manager | client
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL, -- RFC3339
    UNIQUE(user_id, customer_id)
);

CREATE INDEX IF NOT EXISTS idx_ad_accounts_type ON ad_accounts(account_type);

-- ---------------------------------------------------------------------------
-- Manager resolution cache
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS account_bindings (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    resolved_login_customer_id TEXT NOT NULL DEFAULT '',
    last_verified_at TEXT NOT NULL, -- RFC3339
    UNIQUE(user_id, customer_id)
);

-- ---------------------------------------------------------------------------
-- Ingestion audit trail
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS ingestion_runs (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    start_date TEXT NOT NULL, -- YYYY-MM-DD
    end_date TEXT NOT NULL, -- YYYY-MM-DD
    status TEXT NOT NULL, -- running | completed | failed
    records_processed INTEGER NOT NULL DEFAULT 0,
    error_message TEXT NULL,
    started_at TEXT NOT NULL, -- RFC3339
    completed_at TEXT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_ingestion_runs_customer ON ingestion_runs(customer_id);

-- ---------------------------------------------------------------------------
-- Campaign metrics
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS campaign_metrics (
    id INTEGER PRIMARY KEY NOT NULL,
    customer_id TEXT NOT NULL,
    date TEXT NOT NULL, -- YYYY-MM-DD
    campaign_id TEXT NOT NULL,
    platform TEXT NOT NULL,
    campaign_name TEXT NULL,
    impressions INTEGER NOT NULL DEFAULT 0,
    clicks INTEGER NOT NULL DEFAULT 0,
    spend REAL NOT NULL DEFAULT 0,
    conversions REAL NOT NULL DEFAULT 0,
    revenue REAL NOT NULL DEFAULT 0,
    ctr REAL NOT NULL DEFAULT 0,
    cpc REAL NOT NULL DEFAULT 0,
    cpa REAL NOT NULL DEFAULT 0,
    roas REAL NOT NULL DEFAULT 0,
    conversion_rate REAL NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL, -- RFC3339
    UNIQUE(customer_id, date, campaign_id, platform)
);
"#;
