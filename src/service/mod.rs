//! Integration core: token refresh, manager resolution, retries and ingestion.

pub mod backoff;
pub mod discovery;
pub mod ingestor;
pub mod mcc_resolver;
pub mod token_refresher;
pub mod transform;

pub use backoff::{BackoffOutcome, BackoffPolicy, with_backoff};
pub use discovery::{DiscoveryReport, discover_accounts};
pub use ingestor::{AccountResult, BatchReport, BatchSummary, IngestSuccess, MetricsIngestor};
pub use mcc_resolver::{ManagerPolicy, ManagerResolution, MccResolver};
pub use token_refresher::TokenRefresher;

use crate::config::Config;
use crate::db::DbActorHandle;
use crate::google_ads::GoogleAdsApi;
use std::sync::Arc;

/// Service objects wired from one config, database handle and HTTP client.
#[derive(Clone)]
pub struct AdsServices {
    pub api: GoogleAdsApi,
    pub refresher: TokenRefresher,
    pub resolver: MccResolver,
    pub ingestor: MetricsIngestor,
}

impl AdsServices {
    pub fn new(db: DbActorHandle, cfg: &Config, http: reqwest::Client) -> Self {
        Self::with_manager_policy(db, cfg, http, ManagerPolicy::from_flag(cfg.ingest.require_manager))
    }

    pub fn with_manager_policy(
        db: DbActorHandle,
        cfg: &Config,
        http: reqwest::Client,
        manager_policy: ManagerPolicy,
    ) -> Self {
        let google_ads = Arc::new(cfg.google_ads.clone());
        let policy = BackoffPolicy::from_config(&cfg.ingest);

        let api = GoogleAdsApi::new(google_ads.clone(), http.clone());
        let refresher = TokenRefresher::new(db.clone(), google_ads, http, policy);
        let resolver = MccResolver::new(
            db.clone(),
            refresher.clone(),
            api.clone(),
            cfg.ingest.binding_ttl(),
            policy,
        );
        let ingestor = MetricsIngestor::new(
            db,
            refresher.clone(),
            resolver.clone(),
            api.clone(),
            policy,
            manager_policy,
            cfg.ingest.inter_account_delay(),
        );

        Self {
            api,
            refresher,
            resolver,
            ingestor,
        }
    }
}
