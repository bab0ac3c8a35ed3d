use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// HTTP server listen address (e.g., "0.0.0.0", "127.0.0.1").
    /// TOML: `basic.listen_addr`. Default: `0.0.0.0`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// HTTP server listen port.
    /// TOML: `basic.listen_port`. Default: `8188`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Database URL for SQLite.
    /// TOML: `basic.database_url`. Default: `sqlite://adsbridge.db`.
    #[serde(default)]
    pub database_url: String,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default)]
    pub loglevel: String,

    /// Shared key for internal callers (scheduled jobs), sent as `x-api-key`.
    /// TOML: `basic.ingest_key`. Must be provided.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub ingest_key: String,

    /// HS256 secret used to verify end-user session bearer tokens.
    /// TOML: `basic.session_jwt_secret`. Must be provided.
    #[serde(default)]
    pub session_jwt_secret: String,

    /// Expected `aud` claim of session tokens; unset disables the audience check.
    /// TOML: `basic.session_jwt_audience`.
    #[serde(default)]
    pub session_jwt_audience: Option<String>,

    /// Drop the `Secure` flag from OAuth session cookies (plain-HTTP local development only).
    /// TOML: `basic.insecure_cookie`. Default: `false`.
    #[serde(default)]
    pub insecure_cookie: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            database_url: "sqlite://adsbridge.db".to_string(),
            loglevel: "info".to_string(),
            // No insecure defaults. `Config::selftest()` reports these as missing.
            ingest_key: String::new(),
            session_jwt_secret: String::new(),
            session_jwt_audience: None,
            insecure_cookie: false,
        }
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for basic.ingest_key",
        )),
    }
}

/// Default IP address for the HTTP server listen address.
fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

/// Default port for the HTTP server.
fn default_listen_port() -> u16 {
    8188
}
