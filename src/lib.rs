pub mod config;
pub mod db;
pub mod error;
pub mod google_ads;
pub mod server;
pub mod service;

mod oauth_utils;

pub use config::Config;
pub use error::{AdsError, IsRetryable, OauthError};
