use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::schema::init_sql;

/// Handle to the embedded DuckDB event store.
///
/// One `Connection` sits behind an async mutex; every query locks it, which
/// serializes writers and lets the stats recompute hold the guard across a
/// whole transaction for a point-in-time view of the store. The server
/// shares a single handle via `Arc<DuckDbBackend>`.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open or create the database file at `path` and apply the schema.
    /// Initialization is idempotent, so every startup runs it
    /// unconditionally.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests; contents vanish on drop. The memory
    /// limit is pinned at 1GB since no test comes close to it.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Liveness probe backing `/health`: runs `SELECT 1` and checks the
    /// answer, surfacing engine-level failures (locked file, full disk) as
    /// errors.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        let one: i64 = conn
            .prepare("SELECT 1")?
            .query_row([], |row| row.get(0))?;
        anyhow::ensure!(one == 1, "unexpected ping result");
        Ok(())
    }
}

/// Format a timestamp the way every query in this crate passes it to DuckDB.
/// VARCHAR parameters in this format cast implicitly to TIMESTAMP for both
/// inserts and range comparisons.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Parse a `CAST(ts AS VARCHAR)` column back into a UTC timestamp.
/// `%.f` accepts both fractional and whole-second renderings.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .with_context(|| format!("unparseable timestamp from DuckDB: {raw:?}"))?;
    Ok(naive.and_utc())
}

/// Parse a `CAST(decimal AS VARCHAR)` column into an exact decimal.
pub(crate) fn parse_dec(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("unparseable decimal from DuckDB: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_through_wire_format() {
        let ts = Utc::now();
        let parsed = parse_ts(&fmt_ts(ts)).expect("parse");
        // fmt_ts keeps microsecond precision; chrono stores nanoseconds.
        assert_eq!(parsed.timestamp_micros(), ts.timestamp_micros());
    }

    #[test]
    fn parses_whole_second_timestamps() {
        let parsed = parse_ts("2026-08-23 12:00:00").expect("parse");
        assert_eq!(parsed.to_rfc3339(), "2026-08-23T12:00:00+00:00");
    }

    #[test]
    fn parses_decimal_sums() {
        assert_eq!(parse_dec("49.99").expect("parse").to_string(), "49.99");
        assert_eq!(parse_dec("0.00").expect("parse"), Decimal::ZERO);
    }
}
