use crate::error::AdsError;
use crate::google_ads::CustomerId;
use crate::server::guards::auth::Caller;
use crate::server::router::AdsState;
use crate::service::{BackoffPolicy, ManagerPolicy, ManagerResolution, with_backoff};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

const PING_QUERY: &str = "SELECT customer.id FROM customer LIMIT 1";

pub fn router() -> Router<AdsState> {
    Router::new()
        .route("/diag/ping", get(ping_handler))
        .route("/diag/mcc-for/{customer_id}", get(mcc_for_handler))
        .route("/diag/ping-search", post(ping_search_handler))
}

#[derive(Debug, Default, Deserialize)]
pub struct PingQuery {
    #[serde(default)]
    pub selftest: Option<String>,
}

fn flag_set(v: Option<&str>) -> bool {
    matches!(v.map(str::trim), Some("1" | "true" | "yes"))
}

/// GET /diag/ping
///
/// With `?selftest=1` also reports which required settings are present (booleans only).
pub async fn ping_handler(
    State(state): State<AdsState>,
    Query(query): Query<PingQuery>,
) -> Json<Value> {
    let mut body = json!({
        "ok": true,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "time": Utc::now(),
    });
    if flag_set(query.selftest.as_deref()) {
        let report = state.cfg.selftest();
        body["selftest"] = json!(report);
        body["ok"] = json!(report.is_complete());
    }
    Json(body)
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
}

/// GET /diag/mcc-for/{customer_id}
pub async fn mcc_for_handler(
    State(state): State<AdsState>,
    caller: Caller,
    Path(raw_customer): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, AdsError> {
    let user_id = caller.acting_user(query.user_id.as_deref())?;
    let customer = CustomerId::parse(&raw_customer)?;

    match state
        .services()
        .resolver
        .resolve_manager_for(&user_id, &customer)
        .await?
    {
        ManagerResolution::Managed(manager) => Ok(Json(json!({
            "ok": true,
            "customer_id": customer.masked().to_string(),
            "login_customer_id": manager.masked().to_string(),
        }))),
        ManagerResolution::NotManaged => Err(AdsError::NotManaged {
            customer: customer.masked().to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
pub struct PingSearchRequest {
    #[serde(alias = "customer_id")]
    #[serde(rename = "customerId")]
    pub customer_id: String,
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
}

/// POST /diag/ping-search
///
/// Runs a one-row query against the customer to prove token, manager and API access.
pub async fn ping_search_handler(
    State(state): State<AdsState>,
    caller: Caller,
    Json(body): Json<PingSearchRequest>,
) -> Result<Json<Value>, AdsError> {
    let user_id = caller.acting_user(body.user_id.as_deref())?;
    let customer = CustomerId::parse(&body.customer_id)?;

    let services = state.services();
    let login = services
        .resolver
        .login_customer_for(&user_id, &customer, ManagerPolicy::Optional)
        .await?;
    let access_token = services
        .refresher
        .get_valid_access_token(&user_id, None)
        .await?;

    let api = &services.api;
    let token = access_token.as_str();
    let customer_ref = &customer;
    let login_ref = login.as_ref();
    let policy = BackoffPolicy::from_config(&state.cfg.ingest);
    let outcome = with_backoff(policy, "ping search", || async move {
        api.search_page(token, customer_ref, login_ref, PING_QUERY, None)
            .await
    })
    .await;
    let page = outcome.result?;

    info!(
        customer_id = %customer.masked(),
        retries = outcome.retries,
        rows = page.results.len(),
        "Ping search succeeded"
    );
    Ok(Json(json!({
        "ok": true,
        "customer_id": customer.masked().to_string(),
        "login_customer_id": login.as_ref().map(|id| id.masked().to_string()),
        "rows": page.results.len(),
        "retries": outcome.retries,
    })))
}
