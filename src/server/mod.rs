//! HTTP surface: shared state, caller guards and routes.

pub mod guards;
pub mod router;
pub mod routes;

pub use router::{AdsState, ads_router, build_client};
