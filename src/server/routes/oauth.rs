use crate::db::TokenCreate;
use crate::error::{AdsError, OauthError};
use crate::google_ads::GoogleAdsOauth;
use crate::server::guards::auth::Caller;
use crate::server::router::AdsState;
use crate::service::discover_accounts;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::Utc;
use oauth2::{AuthorizationCode, PkceCodeChallenge, PkceCodeVerifier, TokenResponse};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{error, info};

const CSRF_COOKIE: &str = "gads_oauth_csrf_token";
const PKCE_COOKIE: &str = "gads_oauth_pkce_verifier";
const USER_COOKIE: &str = "gads_oauth_user";
const COMPANY_COOKIE: &str = "gads_oauth_company";

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

pub fn router() -> Router<AdsState> {
    Router::new()
        .route("/oauth/google-ads/start", get(oauth_start_handler))
        .route("/oauth/google-ads/callback", get(oauth_callback_handler))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartQuery {
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: String,
    pub state: String,
}

struct OauthSession {
    csrf: String,
    pkce_verifier: String,
    user_id: String,
    company_id: Option<String>,
}

/// GET /oauth/google-ads/start
///
/// Starts the PKCE flow and returns the Google consent URL for the frontend to open.
pub async fn oauth_start_handler(
    State(state): State<AdsState>,
    caller: Caller,
    Query(query): Query<StartQuery>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, AdsError> {
    let user_id = caller.acting_user(query.user_id.as_deref())?;
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) =
        GoogleAdsOauth::build_authorize_url(&state.cfg.google_ads, challenge)?;

    let secure = !state.cfg.basic.insecure_cookie;
    let mut jar = jar
        .add(build_cookie(CSRF_COOKIE, csrf_token.secret().to_string(), secure))
        .add(build_cookie(PKCE_COOKIE, verifier.secret().to_string(), secure))
        .add(build_cookie(USER_COOKIE, user_id.clone(), secure));
    if let Some(company_id) = query.company_id.filter(|c| !c.trim().is_empty()) {
        jar = jar.add(build_cookie(COMPANY_COOKIE, company_id, secure));
    }

    info!(user_id, "Dispatching Google Ads OAuth consent URL");
    Ok((jar, Json(json!({ "auth_url": auth_url.as_str() }))))
}

/// GET /oauth/google-ads/callback
pub async fn oauth_callback_handler(
    State(state): State<AdsState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (jar, session) = take_oauth_cookies(jar);

    match complete_oauth(&state, &query, session).await {
        Ok(accounts_discovered) => {
            info!(accounts_discovered, "Google Ads OAuth callback accepted");
            (
                jar,
                Json(json!({ "success": true, "accounts_discovered": accounts_discovered })),
            )
                .into_response()
        }
        Err(err) => {
            error!(error = %err, "Google Ads OAuth failure");
            (jar, err.into_response()).into_response()
        }
    }
}

async fn complete_oauth(
    state: &AdsState,
    query: &AuthCallbackQuery,
    session: Option<OauthSession>,
) -> Result<usize, AdsError> {
    let session = session.ok_or_else(|| OauthError::Flow {
        code: "OAUTH_SESSION_MISSING".to_string(),
        message: "Missing OAuth session cookies".to_string(),
        details: None,
    })?;

    if !bool::from(query.state.as_bytes().ct_eq(session.csrf.as_bytes())) {
        return Err(OauthError::Flow {
            code: "CSRF_MISMATCH".to_string(),
            message: "CSRF token mismatch".to_string(),
            details: None,
        }
        .into());
    }

    let token_response = GoogleAdsOauth::exchange_authorization_code(
        &state.cfg.google_ads,
        AuthorizationCode::new(query.code.clone()),
        PkceCodeVerifier::new(session.pkce_verifier),
        state.client.clone(),
    )
    .await
    .map_err(|e| OauthError::Flow {
        code: "TOKEN_EXCHANGE_FAILED".to_string(),
        message: format!("Token exchange failed: {e}"),
        details: None,
    })?;

    let refresh_token = token_response
        .refresh_token()
        .map(|t| t.secret().clone())
        .ok_or_else(|| OauthError::Flow {
            code: "MISSING_REFRESH_TOKEN".to_string(),
            message: "Missing refresh_token (check access_type=offline)".to_string(),
            details: None,
        })?;

    let expires_in = token_response
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_EXPIRES_IN_SECS));
    let access_token = token_response.access_token().secret().clone();

    let existing = state
        .db
        .get_token(&session.user_id, session.company_id.as_deref().or(Some("")))
        .await?;
    let current_login = existing.and_then(|t| t.login_customer_id);

    let token_id = state
        .db
        .upsert_token(TokenCreate {
            user_id: session.user_id.clone(),
            company_id: session.company_id.clone(),
            access_token: access_token.clone(),
            refresh_token,
            token_expiry: Utc::now() + expires_in,
            login_customer_id: None,
        })
        .await?;

    let services = state.services();
    let report = discover_accounts(
        &services.api,
        &state.db,
        &session.user_id,
        token_id,
        &access_token,
        current_login.as_deref(),
    )
    .await?;
    Ok(report.accounts_discovered)
}

fn take_oauth_cookies(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<OauthSession>) {
    let csrf = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let pkce = jar.get(PKCE_COOKIE).map(|c| c.value().to_string());
    let user = jar.get(USER_COOKIE).map(|c| c.value().to_string());
    let company = jar.get(COMPANY_COOKIE).map(|c| c.value().to_string());

    let jar = jar
        .remove(Cookie::from(CSRF_COOKIE))
        .remove(Cookie::from(PKCE_COOKIE))
        .remove(Cookie::from(USER_COOKIE))
        .remove(Cookie::from(COMPANY_COOKIE));

    match (csrf, pkce, user) {
        (Some(csrf), Some(pkce_verifier), Some(user_id)) => (
            jar,
            Some(OauthSession {
                csrf,
                pkce_verifier,
                user_id,
                company_id: company,
            }),
        ),
        _ => (jar, None),
    }
}

fn build_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}
