//! The stats aggregator: one deterministic scan per window.

use anyhow::Result;
use chrono::{DateTime, Utc};
use duckdb::Connection;

use cartpulse_core::stats::{recovery_rate, WindowStats};

use crate::backend::{fmt_ts, parse_dec};
use crate::DuckDbBackend;

/// Aggregate abandonments for one shop over the inclusive `[start, end]`
/// range: counts partitioned by `recovered`, the at-risk cart value still
/// outstanding, the value actually recovered, and the derived recovery rate.
///
/// The recovered sum tracks the recorded recovery value, not the original
/// cart value (a $50 cart recovered for $45 counts $45); the one-to-at-most-
/// one join against `recovery_events` is safe because the recovery
/// transition is terminal.
///
/// Pure with respect to its inputs — no wall clock, no randomness — so
/// identical calls over unchanged data return identical results. The
/// aggregation runs in DuckDB's decimal arithmetic; sums come back through
/// `CAST(... AS VARCHAR)` and never touch floating point.
pub(crate) fn compute_window_sync(
    conn: &Connection,
    shop_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<WindowStats> {
    let (abandoned_count, recovered_count, at_risk, recovered) = conn
        .prepare(
            r#"SELECT
                 COUNT(*),
                 CAST(COALESCE(SUM(CASE WHEN e.recovered THEN 1 ELSE 0 END), 0) AS BIGINT),
                 CAST(COALESCE(SUM(CASE WHEN NOT e.recovered THEN e.cart_value ELSE 0 END), 0) AS VARCHAR),
                 CAST(COALESCE(SUM(CASE WHEN e.recovered
                                   THEN COALESCE(r.recovery_value, e.cart_value)
                                   ELSE 0 END), 0) AS VARCHAR)
               FROM cart_abandonment_events e
               LEFT JOIN recovery_events r ON r.cart_abandonment_id = e.id
               WHERE e.shop_id = ?1 AND e.created_at >= ?2 AND e.created_at <= ?3"#,
        )?
        .query_row(
            duckdb::params![shop_id, fmt_ts(start), fmt_ts(end)],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )?;

    Ok(WindowStats {
        at_risk: parse_dec(&at_risk)?,
        recovered: parse_dec(&recovered)?,
        recovery_rate: recovery_rate(recovered_count, abandoned_count),
        abandoned_count,
        recovered_count,
    })
}

impl DuckDbBackend {
    /// Public aggregation entry point; locks the connection for one window.
    pub async fn compute_window(
        &self,
        shop_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WindowStats> {
        let conn = self.conn.lock().await;
        compute_window_sync(&conn, shop_id, start, end)
    }
}
