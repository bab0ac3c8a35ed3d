#![allow(dead_code)]

use adsbridge::Config;
use adsbridge::db::{DbActorHandle, TokenCreate};
use adsbridge::service::AdsServices;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use url::Url;

pub const INTERNAL_KEY: &str = "internal-key";
pub const JWT_SECRET: &str = "session-secret";

/// Scripted stand-in for the Google OAuth token endpoint and the Ads REST API.
#[derive(Clone, Default)]
pub struct MockGoogle {
    pub token_calls: Arc<AtomicUsize>,
    pub probe_calls: Arc<AtomicUsize>,
    pub report_calls: Arc<AtomicUsize>,
    /// manager id -> client ids it manages
    pub managed: Arc<Mutex<HashMap<String, Vec<String>>>>,
    /// customer id -> statuses returned (in order) before report queries succeed
    pub report_failures: Arc<Mutex<HashMap<String, VecDeque<u16>>>>,
    /// customer id -> status returned by every report query
    pub report_always_fail: Arc<Mutex<HashMap<String, u16>>>,
    /// (customer id, login-customer-id header) per report query
    pub report_logins: Arc<Mutex<Vec<(String, Option<String>)>>>,
    /// customer id -> (descriptive name, manager flag)
    pub accounts: Arc<Mutex<Vec<(String, String, bool)>>>,
    /// status for the token endpoint; 200 when unset
    pub token_status: Arc<Mutex<Option<u16>>>,
    /// statuses (HTML gateway pages) the token endpoint returns, in order, before answering
    pub token_outages: Arc<Mutex<VecDeque<u16>>>,
    /// manager id -> status returned by every probe sent to it
    pub probe_always_fail: Arc<Mutex<HashMap<String, u16>>>,
}

impl MockGoogle {
    pub fn manage(&self, manager: &str, client: &str) {
        self.managed
            .lock()
            .unwrap()
            .entry(manager.to_string())
            .or_default()
            .push(client.to_string());
    }

    pub fn fail_reports(&self, customer: &str, statuses: &[u16]) {
        self.report_failures
            .lock()
            .unwrap()
            .insert(customer.to_string(), statuses.iter().copied().collect());
    }

    pub fn always_fail_reports(&self, customer: &str, status: u16) {
        self.report_always_fail
            .lock()
            .unwrap()
            .insert(customer.to_string(), status);
    }

    pub fn add_account(&self, id: &str, name: &str, manager: bool) {
        self.accounts
            .lock()
            .unwrap()
            .push((id.to_string(), name.to_string(), manager));
    }

    pub fn fail_token_endpoint(&self, statuses: &[u16]) {
        self.token_outages
            .lock()
            .unwrap()
            .extend(statuses.iter().copied());
    }

    pub fn always_fail_probes(&self, manager: &str, status: u16) {
        self.probe_always_fail
            .lock()
            .unwrap()
            .insert(manager.to_string(), status);
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn report_calls(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/token", post(token_handler))
            .route(
                "/v19/customers:listAccessibleCustomers",
                get(list_accessible_handler),
            )
            .route("/v19/customers/{id}/googleAds:search", post(search_handler))
            .with_state(self.clone())
    }
}

async fn token_handler(State(mock): State<MockGoogle>) -> Response {
    let n = mock.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let outage = mock.token_outages.lock().unwrap().pop_front();
    if let Some(status) = outage {
        return (
            StatusCode::from_u16(status).unwrap(),
            Html("<html><body>Service Unavailable</body></html>"),
        )
            .into_response();
    }
    let status = mock.token_status.lock().unwrap().unwrap_or(200);
    if status != 200 {
        return (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({ "error": "invalid_grant", "error_description": "Token has been revoked." })),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": format!("fresh-{n}"),
            "refresh_token": "refresh-from-exchange",
            "token_type": "Bearer",
            "expires_in": 3599
        })),
    )
        .into_response()
}

async fn list_accessible_handler(State(mock): State<MockGoogle>) -> Json<Value> {
    let names: Vec<String> = mock
        .accounts
        .lock()
        .unwrap()
        .iter()
        .map(|(id, _, _)| format!("customers/{id}"))
        .collect();
    Json(json!({ "resourceNames": names }))
}

async fn search_handler(
    State(mock): State<MockGoogle>,
    Path(customer): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    let login = headers
        .get("login-customer-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if query.contains("customer_client.level <= 1") {
        let clients = mock
            .managed
            .lock()
            .unwrap()
            .get(&customer)
            .cloned()
            .unwrap_or_default();
        let results: Vec<Value> = clients
            .iter()
            .map(|id| {
                json!({ "customerClient": {
                    "id": id,
                    "descriptiveName": format!("Managed {id}"),
                    "manager": false,
                    "level": "1"
                } })
            })
            .collect();
        return (StatusCode::OK, Json(json!({ "results": results })));
    }

    if query.contains("FROM customer_client") {
        mock.probe_calls.fetch_add(1, Ordering::SeqCst);
        let failure = mock.probe_always_fail.lock().unwrap().get(&customer).copied();
        if let Some(status) = failure {
            return error_reply(status);
        }
        let target = query.rsplit('=').next().unwrap_or_default().trim().to_string();
        let manages = mock
            .managed
            .lock()
            .unwrap()
            .get(&customer)
            .is_some_and(|clients| clients.contains(&target));
        let results = if manages {
            json!([{ "customerClient": { "id": target, "manager": false, "level": "1" } }])
        } else {
            json!([])
        };
        return (StatusCode::OK, Json(json!({ "results": results })));
    }

    if query.contains("FROM customer ") {
        let accounts = mock.accounts.lock().unwrap().clone();
        let results = accounts
            .iter()
            .find(|(id, _, _)| *id == customer)
            .map(|(id, name, manager)| {
                json!([{ "customer": { "id": id, "descriptiveName": name, "manager": manager } }])
            })
            .unwrap_or_else(|| json!([{ "customer": { "id": customer } }]));
        return (StatusCode::OK, Json(json!({ "results": results })));
    }

    mock.report_calls.fetch_add(1, Ordering::SeqCst);
    mock.report_logins
        .lock()
        .unwrap()
        .push((customer.clone(), login));

    if let Some(status) = mock.report_always_fail.lock().unwrap().get(&customer).copied() {
        return error_reply(status);
    }
    let scripted = mock
        .report_failures
        .lock()
        .unwrap()
        .get_mut(&customer)
        .and_then(VecDeque::pop_front);
    if let Some(status) = scripted {
        return error_reply(status);
    }

    let page_token = body["pageToken"].as_str();
    let reply = match page_token {
        None => json!({
            "results": [campaign_row("11", "Brand", "2024-03-01", "1000", "50", "25000000", 5.0, 100.0)],
            "nextPageToken": "page-2"
        }),
        Some(_) => json!({
            "results": [campaign_row("12", "Generic", "2024-03-01", "400", "0", "0", 0.0, 0.0)]
        }),
    };
    (StatusCode::OK, Json(reply))
}

#[allow(clippy::too_many_arguments)]
fn campaign_row(
    id: &str,
    name: &str,
    date: &str,
    impressions: &str,
    clicks: &str,
    cost_micros: &str,
    conversions: f64,
    value: f64,
) -> Value {
    json!({
        "campaign": { "id": id, "name": name },
        "segments": { "date": date },
        "metrics": {
            "impressions": impressions,
            "clicks": clicks,
            "costMicros": cost_micros,
            "conversions": conversions,
            "conversionsValue": value
        }
    })
}

fn error_reply(status: u16) -> (StatusCode, Json<Value>) {
    (
        StatusCode::from_u16(status).unwrap(),
        Json(json!({ "error": { "code": status, "message": "scripted failure" } })),
    )
}

pub async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{addr}")).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

pub fn temp_db_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "adsbridge-{name}-{}-{nanos}.sqlite",
        std::process::id()
    ));
    path
}

pub fn make_cfg(base: &Url) -> Config {
    let mut cfg = Config::default();
    cfg.basic.ingest_key = INTERNAL_KEY.to_string();
    cfg.basic.session_jwt_secret = JWT_SECRET.to_string();
    cfg.basic.insecure_cookie = true;

    cfg.google_ads.api_url = base.clone();
    cfg.google_ads.developer_token = "dev-token".to_string();
    cfg.google_ads.oauth_client_id = "client-id".to_string();
    cfg.google_ads.oauth_client_secret = "client-secret".to_string();
    cfg.google_ads.oauth_auth_url = base.join("/authorize").unwrap();
    cfg.google_ads.oauth_token_url = base.join("/token").unwrap();
    cfg.google_ads.oauth_redirect_url =
        Some(Url::parse("http://localhost:8188/oauth/google-ads/callback").unwrap());

    cfg.ingest.base_delay_ms = 0;
    cfg.ingest.max_jitter_ms = 0;
    cfg.ingest.inter_account_delay_ms = 0;
    cfg
}

pub struct TestEnv {
    pub db: DbActorHandle,
    pub cfg: Config,
    pub mock: MockGoogle,
    pub db_path: PathBuf,
}

impl TestEnv {
    pub async fn start(name: &str) -> Self {
        let mock = MockGoogle::default();
        let base = spawn_test_server(mock.router()).await;
        let cfg = make_cfg(&base);

        let db_path = temp_db_path(name);
        let db = adsbridge::db::spawn(&format!("sqlite:{}", db_path.display()))
            .await
            .expect("spawn db actor");

        Self {
            db,
            cfg,
            mock,
            db_path,
        }
    }

    pub fn services(&self) -> AdsServices {
        AdsServices::new(self.db.clone(), &self.cfg, reqwest::Client::new())
    }

    /// Stores a token for `user_id` expiring `expires_in` from now.
    pub async fn seed_token(
        &self,
        user_id: &str,
        expires_in: Duration,
        login_customer_id: Option<&str>,
    ) -> i64 {
        self.db
            .upsert_token(TokenCreate {
                user_id: user_id.to_string(),
                company_id: None,
                access_token: "stored-access".to_string(),
                refresh_token: "stored-refresh".to_string(),
                token_expiry: Utc::now() + expires_in,
                login_customer_id: login_customer_id.map(str::to_string),
            })
            .await
            .expect("seed token")
    }

    pub async fn cleanup(self) {
        let _ = tokio::fs::remove_file(&self.db_path).await;
    }
}
