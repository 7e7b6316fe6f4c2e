use thiserror::Error;

/// Event-store error taxonomy.
///
/// `Validation`, `NotFound` and `AlreadyRecovered` are client errors the
/// server surfaces directly; `Store` covers engine failures (file locked,
/// disk full) that the write path surfaces as server errors so the caller
/// can retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The recovery transition is terminal. A second recovery attempt
    /// against an already-recovered abandonment is rejected and writes
    /// nothing.
    #[error("cart abandonment already recovered: {0}")]
    AlreadyRecovered(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<duckdb::Error> for StoreError {
    fn from(e: duckdb::Error) -> Self {
        Self::Store(anyhow::Error::new(e))
    }
}
