use crate::config::{Config, GoogleAdsConfig};
use crate::db::DbActorHandle;
use crate::error::AdsError;
use crate::google_ads::customer_id;
use crate::server::routes;
use crate::service::AdsServices;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
};
use axum_extra::extract::cookie::Key;
use base64::Engine as _;
use rand::RngCore;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::time::Instant;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

const ADSBRIDGE_USER_AGENT: &str = concat!("adsbridge/", env!("CARGO_PKG_VERSION"));
const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

/// Outbound client for Google endpoints, honouring `proxy` and `enable_multiplexing`.
pub fn build_client(cfg: &GoogleAdsConfig) -> Result<reqwest::Client, AdsError> {
    let mut headers = HeaderMap::new();

    let mut builder = reqwest::Client::builder()
        .user_agent(ADSBRIDGE_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(2 * 60));

    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    if cfg.enable_multiplexing {
        builder = builder.http2_adaptive_window(true);
    } else {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    }

    Ok(builder.default_headers(headers).build()?)
}

/// Shared handler state. Everything is constructed explicitly in `main` (or a test)
/// and cloned into each request.
#[derive(Clone)]
pub struct AdsState {
    pub db: DbActorHandle,
    pub cfg: Arc<Config>,
    pub client: reqwest::Client,
    cookie_key: Key,
}

impl AdsState {
    pub fn new(db: DbActorHandle, cfg: Arc<Config>) -> Result<Self, AdsError> {
        let client = build_client(&cfg.google_ads)?;
        Ok(Self::with_client(db, cfg, client))
    }

    pub fn with_client(db: DbActorHandle, cfg: Arc<Config>, client: reqwest::Client) -> Self {
        Self {
            db,
            cfg,
            client,
            cookie_key: Key::generate(),
        }
    }

    /// Per-request service objects using the configured manager policy.
    pub fn services(&self) -> AdsServices {
        AdsServices::new(self.db.clone(), &self.cfg, self.client.clone())
    }
}

impl FromRef<AdsState> for Key {
    fn from_ref(state: &AdsState) -> Self {
        state.cookie_key.clone()
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    // Always reflect `x-request-id`, even if the client didn't send one.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis();
    let path = customer_id::mask_path(uri.path());
    let protocol = format_http_version(version);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

pub fn ads_router(state: AdsState) -> Router {
    Router::new()
        .merge(routes::diag::router())
        .merge(routes::ingest::router())
        .merge(routes::oauth::router())
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}
