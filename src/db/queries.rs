//! SQL statements executed by the database actor.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{
    AccountType, DbAccountBinding, DbAdAccount, DbIngestionRecord, DbTokenRecord, IngestionStatus,
    MetricRow,
};
use super::patch::{
    AdAccountUpsert, BindingUpsert, IngestionCreate, IngestionFinish, TokenCreate, TokenPatch,
    UpsertCounts,
};
use crate::error::AdsError;

const TOKEN_COLUMNS: &str = "id, user_id, company_id, access_token, refresh_token, token_expiry, \
     login_customer_id, created_at, updated_at";

pub(super) async fn upsert_token(pool: &SqlitePool, c: TokenCreate) -> Result<i64, AdsError> {
    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        r#"
    INSERT INTO oauth_tokens (
        user_id, company_id, access_token, refresh_token, token_expiry, login_customer_id, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(user_id, company_id) DO UPDATE SET
        access_token = excluded.access_token,
        refresh_token = excluded.refresh_token,
        token_expiry = excluded.token_expiry,
        login_customer_id = COALESCE(excluded.login_customer_id, login_customer_id),
        updated_at = excluded.updated_at
    RETURNING id
    "#,
    )
    .bind(c.user_id)
    .bind(c.company_id.unwrap_or_default())
    .bind(c.access_token)
    .bind(c.refresh_token)
    .bind(c.token_expiry)
    .bind(c.login_customer_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Exact (user, company) match, or for `None` the company-less row first, then the most
/// recently updated one.
pub(super) async fn get_token(
    pool: &SqlitePool,
    user_id: &str,
    company_id: Option<&str>,
) -> Result<Option<DbTokenRecord>, AdsError> {
    let row = match company_id {
        Some(company_id) => {
            sqlx::query_as::<_, DbTokenRecord>(&format!(
                "SELECT {TOKEN_COLUMNS} FROM oauth_tokens WHERE user_id = ? AND company_id = ?"
            ))
            .bind(user_id)
            .bind(company_id)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbTokenRecord>(&format!(
                "SELECT {TOKEN_COLUMNS} FROM oauth_tokens WHERE user_id = ? \
                 ORDER BY (company_id = '') DESC, updated_at DESC, id DESC LIMIT 1"
            ))
            .bind(user_id)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(row)
}

pub(super) async fn list_tokens_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<DbTokenRecord>, AdsError> {
    let rows = sqlx::query_as::<_, DbTokenRecord>(&format!(
        "SELECT {TOKEN_COLUMNS} FROM oauth_tokens WHERE user_id = ? ORDER BY updated_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub(super) async fn patch_token(
    pool: &SqlitePool,
    id: i64,
    patch: TokenPatch,
) -> Result<(), AdsError> {
    let TokenPatch {
        access_token,
        refresh_token,
        token_expiry,
        login_customer_id,
    } = patch;

    let access_token_set = access_token.is_some();
    let refresh_token_set = refresh_token.is_some();
    let login_customer_id_set = login_customer_id.is_some();
    let updated_at = Utc::now();

    let res = sqlx::query(
        r#"
        UPDATE oauth_tokens
        SET
            access_token = COALESCE(?, access_token),
            refresh_token = COALESCE(?, refresh_token),
            token_expiry = COALESCE(?, token_expiry),
            login_customer_id = COALESCE(?, login_customer_id),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(token_expiry)
    .bind(login_customer_id)
    .bind(updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    let affected = res.rows_affected();
    debug!(
        table = "oauth_tokens",
        id,
        affected,
        access_token_set,
        refresh_token_set,
        login_customer_id_set,
        "db patch applied"
    );

    if affected == 0 {
        return Err(AdsError::UnexpectedError(format!(
            "token record not found for id={id}"
        )));
    }
    Ok(())
}

pub(super) async fn upsert_ad_account(
    pool: &SqlitePool,
    a: AdAccountUpsert,
) -> Result<(), AdsError> {
    let now = Utc::now();
    sqlx::query(
        r#"
    INSERT INTO ad_accounts (user_id, customer_id, descriptive_name, account_type, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(user_id, customer_id) DO UPDATE SET
        descriptive_name = COALESCE(excluded.descriptive_name, descriptive_name),
        account_type = excluded.account_type,
        updated_at = excluded.updated_at
    "#,
    )
    .bind(a.user_id)
    .bind(a.customer_id)
    .bind(a.descriptive_name)
    .bind(a.account_type)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn list_manager_accounts(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<DbAdAccount>, AdsError> {
    let rows = sqlx::query_as::<_, DbAdAccount>(
        r#"
    SELECT id, user_id, customer_id, descriptive_name, account_type, created_at, updated_at
    FROM ad_accounts
    WHERE user_id = ? AND account_type = ?
    ORDER BY id
    "#,
    )
    .bind(user_id)
    .bind(AccountType::Manager)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Client accounts whose owner still has a stored token.
pub(super) async fn list_ingestable_accounts(
    pool: &SqlitePool,
) -> Result<Vec<DbAdAccount>, AdsError> {
    let rows = sqlx::query_as::<_, DbAdAccount>(
        r#"
    SELECT a.id, a.user_id, a.customer_id, a.descriptive_name, a.account_type, a.created_at, a.updated_at
    FROM ad_accounts a
    WHERE a.account_type = ?
      AND EXISTS (SELECT 1 FROM oauth_tokens t WHERE t.user_id = a.user_id)
    ORDER BY a.id
    "#,
    )
    .bind(AccountType::Client)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub(super) async fn get_binding(
    pool: &SqlitePool,
    user_id: &str,
    customer_id: &str,
) -> Result<Option<DbAccountBinding>, AdsError> {
    let row = sqlx::query_as::<_, DbAccountBinding>(
        r#"
    SELECT id, user_id, customer_id, resolved_login_customer_id, last_verified_at
    FROM account_bindings
    WHERE user_id = ? AND customer_id = ?
    "#,
    )
    .bind(user_id)
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub(super) async fn upsert_binding(pool: &SqlitePool, b: BindingUpsert) -> Result<(), AdsError> {
    sqlx::query(
        r#"
    INSERT INTO account_bindings (user_id, customer_id, resolved_login_customer_id, last_verified_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(user_id, customer_id) DO UPDATE SET
        resolved_login_customer_id = excluded.resolved_login_customer_id,
        last_verified_at = excluded.last_verified_at
    "#,
    )
    .bind(b.user_id)
    .bind(b.customer_id)
    .bind(b.resolved_login_customer_id)
    .bind(b.last_verified_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn create_ingestion(
    pool: &SqlitePool,
    c: IngestionCreate,
) -> Result<i64, AdsError> {
    let id: i64 = sqlx::query_scalar(
        r#"
    INSERT INTO ingestion_runs (user_id, customer_id, start_date, end_date, status, records_processed, started_at)
    VALUES (?, ?, ?, ?, ?, 0, ?)
    RETURNING id
    "#,
    )
    .bind(c.user_id)
    .bind(c.customer_id)
    .bind(c.start_date)
    .bind(c.end_date)
    .bind(IngestionStatus::Running)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub(super) async fn finish_ingestion(
    pool: &SqlitePool,
    f: IngestionFinish,
) -> Result<(), AdsError> {
    let res = sqlx::query(
        r#"
    UPDATE ingestion_runs
    SET status = ?, records_processed = ?, error_message = ?, completed_at = ?
    WHERE id = ?
    "#,
    )
    .bind(f.status)
    .bind(f.records_processed)
    .bind(f.error_message)
    .bind(Utc::now())
    .bind(f.id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AdsError::UnexpectedError(format!(
            "ingestion run not found for id={}",
            f.id
        )));
    }
    Ok(())
}

pub(super) async fn get_ingestion(
    pool: &SqlitePool,
    id: i64,
) -> Result<DbIngestionRecord, AdsError> {
    let row = sqlx::query_as::<_, DbIngestionRecord>(
        r#"
    SELECT id, user_id, customer_id, start_date, end_date, status, records_processed,
           error_message, started_at, completed_at
    FROM ingestion_runs
    WHERE id = ?
    "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Idempotent upsert; a row counts as updated when its key already existed.
pub(super) async fn upsert_metrics(
    pool: &SqlitePool,
    rows: Vec<MetricRow>,
) -> Result<UpsertCounts, AdsError> {
    let mut counts = UpsertCounts::default();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for row in rows {
        let existing: Option<i64> = sqlx::query_scalar(
            r#"
        SELECT id FROM campaign_metrics
        WHERE customer_id = ? AND date = ? AND campaign_id = ? AND platform = ?
        "#,
        )
        .bind(&row.customer_id)
        .bind(row.date)
        .bind(&row.campaign_id)
        .bind(row.platform)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
        INSERT INTO campaign_metrics (
            customer_id, date, campaign_id, platform, campaign_name, impressions, clicks, spend,
            conversions, revenue, ctr, cpc, cpa, roas, conversion_rate, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(customer_id, date, campaign_id, platform) DO UPDATE SET
            campaign_name = COALESCE(excluded.campaign_name, campaign_name),
            impressions = excluded.impressions,
            clicks = excluded.clicks,
            spend = excluded.spend,
            conversions = excluded.conversions,
            revenue = excluded.revenue,
            ctr = excluded.ctr,
            cpc = excluded.cpc,
            cpa = excluded.cpa,
            roas = excluded.roas,
            conversion_rate = excluded.conversion_rate,
            updated_at = excluded.updated_at
        "#,
        )
        .bind(&row.customer_id)
        .bind(row.date)
        .bind(&row.campaign_id)
        .bind(row.platform)
        .bind(&row.campaign_name)
        .bind(row.impressions)
        .bind(row.clicks)
        .bind(row.spend)
        .bind(row.conversions)
        .bind(row.revenue)
        .bind(row.ctr)
        .bind(row.cpc)
        .bind(row.cpa)
        .bind(row.roas)
        .bind(row.conversion_rate)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if existing.is_some() {
            counts.updated += 1;
        } else {
            counts.inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(counts)
}

pub(super) async fn list_metrics(
    pool: &SqlitePool,
    customer_id: &str,
) -> Result<Vec<MetricRow>, AdsError> {
    let rows = sqlx::query_as::<_, MetricRow>(
        r#"
    SELECT customer_id, date, campaign_id, platform, campaign_name, impressions, clicks, spend,
           conversions, revenue, ctr, cpc, cpa, roas, conversion_rate
    FROM campaign_metrics
    WHERE customer_id = ?
    ORDER BY date, campaign_id
    "#,
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
