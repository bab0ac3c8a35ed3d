use crate::config::GoogleAdsConfig;
use crate::error::{AdsError, OauthError};
use crate::oauth_utils::{OauthTokenResponse, StandardOauth2Client, build_oauth2_client};
use oauth2::{
    AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope,
};
use tracing::info;

/// Stateless Google OAuth endpoints built from [`GoogleAdsConfig`].
///
/// A fresh oauth2 client is built per call so tests can point the token URL at a mock server.
pub struct GoogleAdsOauth;

impl GoogleAdsOauth {
    fn build_client(cfg: &GoogleAdsConfig) -> Result<StandardOauth2Client, AdsError> {
        let redirect = cfg
            .oauth_redirect_url
            .as_ref()
            .map(|u| RedirectUrl::new(u.to_string()))
            .transpose()?;
        build_oauth2_client(
            &cfg.oauth_client_id,
            Some(&cfg.oauth_client_secret),
            cfg.oauth_auth_url.as_str(),
            cfg.oauth_token_url.as_str(),
            redirect,
        )
    }

    /// Build an auth URL with configured scopes and PKCE challenge preset.
    pub(crate) fn build_authorize_url(
        cfg: &GoogleAdsConfig,
        pkce_challenge: PkceCodeChallenge,
    ) -> Result<(url::Url, CsrfToken), AdsError> {
        let client = Self::build_client(cfg)?;
        let mut req = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            // Offline access is what yields a refresh token.
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &cfg.oauth_scopes {
            req = req.add_scope(Scope::new(scope.clone()));
        }

        Ok(req.url())
    }

    /// Exchange an authorization code (PKCE) for tokens.
    pub(crate) async fn exchange_authorization_code(
        cfg: &GoogleAdsConfig,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: reqwest::Client,
    ) -> Result<OauthTokenResponse, OauthError> {
        let client = Self::build_client(cfg).map_err(|e| OauthError::Other {
            message: format!("failed to build oauth2 client: {e}"),
        })?;

        let token_result: OauthTokenResponse = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&http_client)
            .await?;

        info!("Google Ads OAuth2 code exchange completed successfully");
        Ok(token_result)
    }

    /// `grant_type=refresh_token` exchange against the configured token endpoint.
    pub(crate) async fn refresh_access_token(
        cfg: &GoogleAdsConfig,
        refresh_token: &str,
        http_client: reqwest::Client,
    ) -> Result<OauthTokenResponse, OauthError> {
        let client = Self::build_client(cfg).map_err(|e| OauthError::Other {
            message: format!("failed to build oauth2 client: {e}"),
        })?;

        let token_result: OauthTokenResponse = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await?;
        Ok(token_result)
    }
}
