//! Database module: models, schema and the actor that owns the pool.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `patch.rs`: write payloads sent to the actor
//! - `queries.rs`: SQL executed inside the actor
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)

pub mod actor;
pub mod models;
pub mod patch;
pub mod schema;

mod queries;

pub use models::{
    AccountType, DbAccountBinding, DbAdAccount, DbIngestionRecord, DbTokenRecord,
    IngestionStatus, MetricRow, Platform,
};
pub use patch::{
    AdAccountUpsert, BindingUpsert, IngestionCreate, IngestionFinish, TokenCreate, TokenPatch,
    UpsertCounts,
};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};
