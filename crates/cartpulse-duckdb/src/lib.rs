pub mod backend;
pub mod cache;
pub mod error;
pub mod ingest;
pub mod popups;
pub mod queries;
pub mod schema;

pub use backend::DuckDbBackend;
pub use error::StoreError;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `cartpulse_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
