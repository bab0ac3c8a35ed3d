pub mod auth;

pub use auth::{Caller, RequireInternalKey};
