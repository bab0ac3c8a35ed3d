use serde::{Deserialize, Serialize};
use url::Url;

/// Google Ads API and OAuth client configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleAdsConfig {
    /// Base URL of the Google Ads REST API.
    /// TOML: `google_ads.api_url`. Default: `https://googleads.googleapis.com`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// API version path segment.
    /// TOML: `google_ads.api_version`. Default: `v19`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Developer token sent as the `developer-token` header. Required.
    /// TOML: `google_ads.developer_token`.
    #[serde(default)]
    pub developer_token: String,

    /// OAuth client id. Required.
    /// TOML: `google_ads.oauth_client_id`.
    #[serde(default)]
    pub oauth_client_id: String,

    /// OAuth client secret. Required.
    /// TOML: `google_ads.oauth_client_secret`.
    #[serde(default)]
    pub oauth_client_secret: String,

    /// Redirect URI registered for the OAuth client (points at `/oauth/google-ads/callback`). Required.
    /// TOML: `google_ads.oauth_redirect_url`.
    #[serde(default)]
    pub oauth_redirect_url: Option<Url>,

    /// TOML: `google_ads.oauth_auth_url`. Default: Google's v2 auth endpoint.
    #[serde(default = "default_oauth_auth_url")]
    pub oauth_auth_url: Url,

    /// TOML: `google_ads.oauth_token_url`. Default: `https://oauth2.googleapis.com/token`.
    #[serde(default = "default_oauth_token_url")]
    pub oauth_token_url: Url,

    /// TOML: `google_ads.oauth_scopes`. Default: the `adwords` scope.
    #[serde(default = "default_oauth_scopes")]
    pub oauth_scopes: Vec<String>,

    /// Optional upstream HTTP proxy. If set, used for the reqwest client.
    /// TOML: `google_ads.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing for reqwest clients; disabled forces HTTP/1.
    /// TOML: `google_ads.enable_multiplexing`. Default: `false`.
    #[serde(default)]
    pub enable_multiplexing: bool,

    /// Access tokens expiring within this many seconds are refreshed before use.
    /// TOML: `google_ads.token_expiry_buffer_secs`. Default: `300`.
    #[serde(default = "default_token_expiry_buffer_secs")]
    pub token_expiry_buffer_secs: i64,
}

impl GoogleAdsConfig {
    /// `{api_url}/{api_version}` without a trailing slash.
    pub fn versioned_base(&self) -> String {
        format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }

    pub fn expiry_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_expiry_buffer_secs.max(0))
    }
}

impl Default for GoogleAdsConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_version: default_api_version(),
            developer_token: String::new(),
            oauth_client_id: String::new(),
            oauth_client_secret: String::new(),
            oauth_redirect_url: None,
            oauth_auth_url: default_oauth_auth_url(),
            oauth_token_url: default_oauth_token_url(),
            oauth_scopes: default_oauth_scopes(),
            proxy: None,
            enable_multiplexing: false,
            token_expiry_buffer_secs: default_token_expiry_buffer_secs(),
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://googleads.googleapis.com").expect("default api_url must be a valid URL")
}

fn default_api_version() -> String {
    "v19".to_string()
}

fn default_oauth_auth_url() -> Url {
    Url::parse("https://accounts.google.com/o/oauth2/v2/auth")
        .expect("default oauth_auth_url must be a valid URL")
}

fn default_oauth_token_url() -> Url {
    Url::parse("https://oauth2.googleapis.com/token")
        .expect("default oauth_token_url must be a valid URL")
}

fn default_oauth_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/adwords".to_string()]
}

fn default_token_expiry_buffer_secs() -> i64 {
    300
}
