use crate::error::AdsError;
use crate::google_ads::CustomerId;
use crate::server::guards::auth::{Caller, RequireInternalKey};
use crate::server::router::AdsState;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

pub fn router() -> Router<AdsState> {
    Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/ingest-daily", post(ingest_daily_handler))
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "customerId")]
    pub customer_id: String,
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default, rename = "startDate", alias = "start_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, rename = "endDate", alias = "end_date")]
    pub end_date: Option<NaiveDate>,
}

/// Missing bounds default to `lookback_days` ending yesterday.
fn resolve_window(
    today: NaiveDate,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    lookback_days: i64,
) -> Result<(NaiveDate, NaiveDate), AdsError> {
    let yesterday = today.pred_opt().unwrap_or(today);
    let end = end.unwrap_or(yesterday);
    let span = u64::try_from(lookback_days.max(1) - 1).unwrap_or(0);
    let start = match start {
        Some(start) => start,
        None => end.checked_sub_days(Days::new(span)).unwrap_or(end),
    };

    if start > end {
        return Err(AdsError::BadRequest(format!(
            "startDate {start} is after endDate {end}"
        )));
    }
    Ok((start, end))
}

/// POST /ingest
pub async fn ingest_handler(
    State(state): State<AdsState>,
    caller: Caller,
    Json(body): Json<IngestRequest>,
) -> Result<Response, AdsError> {
    let user_id = caller.acting_user(body.user_id.as_deref())?;
    let customer = CustomerId::parse(&body.customer_id)?;
    let (start, end) = resolve_window(
        Utc::now().date_naive(),
        body.start_date,
        body.end_date,
        state.cfg.ingest.default_lookback_days,
    )?;

    let services = state.services();
    match services
        .ingestor
        .ingest_customer(&customer, &user_id, start, end)
        .await
    {
        Ok(ok) => Ok(Json(json!({
            "success": true,
            "records_processed": ok.records_processed,
            "customer_id": customer.masked().to_string(),
            "inserted": ok.inserted,
            "updated": ok.updated,
            "ingestion_id": ok.ingestion_id,
        }))
        .into_response()),
        Err(e) => Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": e.to_string(),
                "customer_id": customer.masked().to_string(),
            })),
        )
            .into_response()),
    }
}

/// POST /ingest-daily
///
/// Ingests yesterday for every account with a stored token. Fails only when every
/// account failed.
pub async fn ingest_daily_handler(
    State(state): State<AdsState>,
    _auth: RequireInternalKey,
) -> Result<Response, AdsError> {
    let today = Utc::now().date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);

    let report = state.services().ingestor.ingest_daily(yesterday).await?;
    let status = if report.all_failed() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({
            "success": !report.all_failed(),
            "date": yesterday,
            "summary": report.summary,
            "results": report.results,
        })),
    )
        .into_response())
}
