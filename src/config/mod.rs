mod basic;
mod google_ads;
mod ingest;

pub use basic::BasicConfig;
pub use google_ads::GoogleAdsConfig;
pub use ingest::IngestConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Google Ads API + OAuth client settings (see `google_ads` table in config.toml).
    #[serde(default)]
    pub google_ads: GoogleAdsConfig,

    /// Ingestion tuning (see `ingest` table in config.toml).
    #[serde(default)]
    pub ingest: IngestConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "ADSBRIDGE_";

impl Config {
    /// Builds a Figment that merges defaults, an optional `config.toml`, then
    /// `ADSBRIDGE_`-prefixed environment variables (`__` separates tables).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration without validating required fields.
    ///
    /// Binaries should check [`Config::selftest`] before serving.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// Reports which required settings are present. Values are never included.
    pub fn selftest(&self) -> SelfTestReport {
        fn set(s: &str) -> bool {
            !s.trim().is_empty()
        }

        SelfTestReport {
            google_oauth_client_id: set(&self.google_ads.oauth_client_id),
            google_oauth_client_secret: set(&self.google_ads.oauth_client_secret),
            google_oauth_redirect_uri: self.google_ads.oauth_redirect_url.is_some(),
            google_ads_developer_token: set(&self.google_ads.developer_token),
            database_url: set(&self.basic.database_url),
            ingest_key: set(&self.basic.ingest_key),
            session_jwt_secret: set(&self.basic.session_jwt_secret),
        }
    }
}

/// Presence of each required setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelfTestReport {
    pub google_oauth_client_id: bool,
    pub google_oauth_client_secret: bool,
    pub google_oauth_redirect_uri: bool,
    pub google_ads_developer_token: bool,
    pub database_url: bool,
    pub ingest_key: bool,
    pub session_jwt_secret: bool,
}

impl SelfTestReport {
    pub fn is_complete(&self) -> bool {
        self.google_oauth_client_id
            && self.google_oauth_client_secret
            && self.google_oauth_redirect_uri
            && self.google_ads_developer_token
            && self.database_url
            && self.ingest_key
            && self.session_jwt_secret
    }
}
