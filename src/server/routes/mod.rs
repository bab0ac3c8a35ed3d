pub mod diag;
pub mod ingest;
pub mod oauth;
