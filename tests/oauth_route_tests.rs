mod common;

use adsbridge::db::AccountType;
use adsbridge::server::{AdsState, ads_router};
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use common::{JWT_SECRET, TestEnv};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

const MANAGER: &str = "9990001111";
const CLIENT: &str = "1234567890";
/// Client reachable only through the manager's hierarchy.
const MANAGED_ONLY: &str = "5550001111";

fn session_token(sub: &str) -> String {
    let claims = json!({
        "sub": sub,
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn connect_flow_stores_token_and_discovers_accounts() {
    let env = TestEnv::start("oauth-connect").await;
    env.mock.add_account(MANAGER, "Agency MCC", true);
    env.mock.add_account(CLIENT, "Client A", false);
    env.mock.manage(MANAGER, CLIENT);
    env.mock.manage(MANAGER, MANAGED_ONLY);
    let app = ads_router(AdsState::with_client(
        env.db.clone(),
        Arc::new(env.cfg.clone()),
        reqwest::Client::new(),
    ));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/oauth/google-ads/start")
                .header(header::AUTHORIZATION, format!("Bearer {}", session_token("user-1")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies: Vec<String> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect();
    assert!(cookies.len() >= 3, "csrf, pkce and user cookies expected");

    let body = json_body(resp).await;
    let auth_url = Url::parse(body["auth_url"].as_str().unwrap()).unwrap();
    let params: std::collections::HashMap<String, String> =
        auth_url.query_pairs().into_owned().collect();
    assert_eq!(params.get("access_type").map(String::as_str), Some("offline"));
    assert_eq!(params.get("prompt").map(String::as_str), Some("consent"));
    assert!(params.contains_key("code_challenge"));
    let csrf = params.get("state").cloned().unwrap();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/oauth/google-ads/callback?code=auth-code&state={csrf}"))
                .header(header::COOKIE, cookies.join("; "))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["accounts_discovered"], json!(3));

    let token = env.db.get_token("user-1", None).await.unwrap().unwrap();
    assert_eq!(token.refresh_token, "refresh-from-exchange");
    assert_eq!(token.login_customer_id.as_deref(), Some(MANAGER));

    let managers = env.db.list_manager_accounts("user-1").await.unwrap();
    assert_eq!(managers.len(), 1);
    assert_eq!(managers[0].customer_id, MANAGER);
    assert_eq!(managers[0].account_type, AccountType::Manager);

    let ingestable = env.db.list_ingestable_accounts().await.unwrap();
    let ids: Vec<&str> = ingestable.iter().map(|a| a.customer_id.as_str()).collect();
    assert_eq!(ids, vec![CLIENT, MANAGED_ONLY]);
    assert!(ingestable.iter().all(|a| a.account_type == AccountType::Client));

    env.cleanup().await;
}

#[tokio::test]
async fn callback_without_session_cookies_is_forbidden() {
    let env = TestEnv::start("oauth-no-session").await;
    let app = ads_router(AdsState::with_client(
        env.db.clone(),
        Arc::new(env.cfg.clone()),
        reqwest::Client::new(),
    ));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/oauth/google-ads/callback?code=c&state=s")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = json_body(resp).await;
    assert_eq!(body["code"], json!("OAUTH_FLOW"));
    assert_eq!(env.mock.token_calls(), 0);

    env.cleanup().await;
}

#[tokio::test]
async fn callback_with_mismatched_state_is_forbidden() {
    let env = TestEnv::start("oauth-csrf-mismatch").await;
    let app = ads_router(AdsState::with_client(
        env.db.clone(),
        Arc::new(env.cfg.clone()),
        reqwest::Client::new(),
    ));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/oauth/google-ads/start")
                .header(header::AUTHORIZATION, format!("Bearer {}", session_token("user-1")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let cookies: Vec<String> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect();

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/oauth/google-ads/callback?code=auth-code&state=forged-state")
                .header(header::COOKIE, cookies.join("; "))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = json_body(resp).await;
    assert_eq!(body["code"], json!("OAUTH_FLOW"));
    assert!(body["error"].as_str().unwrap().contains("CSRF"));
    assert_eq!(env.mock.token_calls(), 0);
    assert!(env.db.get_token("user-1", None).await.unwrap().is_none());

    env.cleanup().await;
}
