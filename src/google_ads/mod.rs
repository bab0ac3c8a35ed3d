//! Google Ads glue: customer ids, OAuth endpoints and the GAQL search client.

pub mod api;
pub mod customer_id;
pub mod oauth;
pub mod types;

pub use api::{GoogleAdsApi, UPSTREAM_BODY_PREVIEW_CHARS};
pub use customer_id::CustomerId;
pub use oauth::GoogleAdsOauth;
