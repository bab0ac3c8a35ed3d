//! Typed views of the Google Ads REST payloads this service reads.
//!
//! The REST surface encodes int64 fields as JSON strings, so numeric fields go
//! through lenient deserializers that accept either form.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
    #[serde(rename = "pageToken", skip_serializing_if = "Option::is_none")]
    pub page_token: Option<&'a str>,
}

/// One page of `googleAds:search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<GoogleAdsRow>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAdsRow {
    #[serde(default)]
    pub customer: Option<CustomerFields>,
    #[serde(default)]
    pub customer_client: Option<CustomerFields>,
    #[serde(default)]
    pub campaign: Option<CampaignFields>,
    #[serde(default)]
    pub segments: Option<Segments>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
}

/// Shared shape of `customer` and `customer_client` resources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFields {
    #[serde(default, deserialize_with = "lax_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub descriptive_name: Option<String>,
    #[serde(default)]
    pub manager: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignFields {
    #[serde(default, deserialize_with = "lax_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Segments {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(default, deserialize_with = "lax_i64")]
    pub impressions: i64,
    #[serde(default, deserialize_with = "lax_i64")]
    pub clicks: i64,
    #[serde(default, deserialize_with = "lax_i64")]
    pub cost_micros: i64,
    #[serde(default, deserialize_with = "lax_f64")]
    pub conversions: f64,
    #[serde(default, deserialize_with = "lax_f64")]
    pub conversions_value: f64,
}

/// `customers:listAccessibleCustomers` response (`customers/{id}` resource names).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibleCustomers {
    #[serde(default)]
    pub resource_names: Vec<String>,
}

impl AccessibleCustomers {
    pub fn customer_ids(&self) -> impl Iterator<Item = &str> {
        self.resource_names
            .iter()
            .map(|name| name.strip_prefix("customers/").unwrap_or(name))
    }
}

fn lax_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Null => Ok(None),
        other => Err(de::Error::custom(format!("expected id, got {other}"))),
    }
}

fn lax_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => s.parse().map_err(de::Error::custom),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("expected integer, got {n}"))),
        Value::Null => Ok(0),
        other => Err(de::Error::custom(format!("expected integer, got {other}"))),
    }
}

fn lax_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => s.parse().map_err(de::Error::custom),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom(format!("expected number, got {n}"))),
        Value::Null => Ok(0.0),
        other => Err(de::Error::custom(format!("expected number, got {other}"))),
    }
}
