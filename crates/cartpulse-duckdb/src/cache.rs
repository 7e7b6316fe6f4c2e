//! The per-shop stats cache.
//!
//! A derived, disposable projection over the event store: one row per shop
//! holding the three windows, upserted whole on every recompute. Because
//! the aggregation is deterministic, concurrent recomputes for the same
//! shop converge to the same answer; the connection mutex additionally
//! serializes them, which doubles as the single-flight guard.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use tracing::warn;

use cartpulse_core::stats::{StatsSnapshot, WindowStats};
use cartpulse_core::window::{month_window, today_window, week_window};

use crate::backend::{fmt_ts, parse_dec, parse_ts};
use crate::queries::windows::compute_window_sync;
use crate::{DuckDbBackend, StoreError};

impl DuckDbBackend {
    /// Cache-or-recompute read.
    ///
    /// Returns the cached snapshot when it is younger than `staleness`;
    /// otherwise recomputes all three windows from one captured `now` and
    /// upserts. If the recompute fails but a cached row exists, the stale
    /// row is returned (logged) rather than failing the read; with no
    /// cached row the error propagates.
    pub async fn get_stats(
        &self,
        shop_id: &str,
        now: DateTime<Utc>,
        staleness: Duration,
    ) -> Result<StatsSnapshot, StoreError> {
        let mut conn = self.conn.lock().await;

        let cached = read_snapshot_sync(&conn, shop_id)?;
        if let Some(ref snapshot) = cached {
            let age = now - snapshot.last_updated;
            if age <= chrono::Duration::from_std(staleness).unwrap_or(chrono::Duration::zero()) {
                return Ok(snapshot.clone());
            }
        }

        match recompute_snapshot_sync(&mut conn, shop_id, now) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match cached {
                Some(snapshot) => {
                    warn!(shop_id, error = %e, "stats recompute failed, serving stale snapshot");
                    Ok(snapshot)
                }
                None => Err(StoreError::Store(e)),
            },
        }
    }

    /// Force a recompute regardless of staleness. Used by the background
    /// refresh task after a write touches a shop.
    pub async fn recompute_snapshot(
        &self,
        shop_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StatsSnapshot> {
        let mut conn = self.conn.lock().await;
        recompute_snapshot_sync(&mut conn, shop_id, now)
    }

    /// Read the cached snapshot without touching staleness. `None` until the
    /// first recompute for the shop.
    pub async fn read_snapshot(&self, shop_id: &str) -> Result<Option<StatsSnapshot>> {
        let conn = self.conn.lock().await;
        read_snapshot_sync(&conn, shop_id)
    }
}

/// Compute all three windows from a single captured `now` and upsert the row.
///
/// Runs inside one transaction so the three window scans see the same store
/// state and the upsert lands atomically — no partial staleness across
/// windows.
fn recompute_snapshot_sync(
    conn: &mut Connection,
    shop_id: &str,
    now: DateTime<Utc>,
) -> Result<StatsSnapshot> {
    let tx = conn.transaction()?;

    let today_bounds = today_window(now);
    let week_bounds = week_window(now);
    let month_bounds = month_window(now);

    let today = compute_window_sync(&tx, shop_id, today_bounds.start, today_bounds.end)?;
    let week = compute_window_sync(&tx, shop_id, week_bounds.start, week_bounds.end)?;
    let month = compute_window_sync(&tx, shop_id, month_bounds.start, month_bounds.end)?;

    tx.execute(
        r#"INSERT OR REPLACE INTO revenue_stats_cache (
            shop_id,
            today_at_risk, today_recovered, today_recovery_rate,
            today_abandoned_count, today_recovered_count,
            week_at_risk, week_recovered, week_recovery_rate,
            week_abandoned_count, week_recovered_count,
            month_at_risk, month_recovered, month_recovery_rate,
            month_abandoned_count, month_recovered_count,
            last_updated
        ) VALUES (
            ?1,
            ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14, ?15, ?16,
            ?17
        )"#,
        duckdb::params![
            shop_id,
            today.at_risk.to_string(),
            today.recovered.to_string(),
            today.recovery_rate,
            today.abandoned_count,
            today.recovered_count,
            week.at_risk.to_string(),
            week.recovered.to_string(),
            week.recovery_rate,
            week.abandoned_count,
            week.recovered_count,
            month.at_risk.to_string(),
            month.recovered.to_string(),
            month.recovery_rate,
            month.abandoned_count,
            month.recovered_count,
            fmt_ts(now),
        ],
    )?;

    tx.commit()?;

    Ok(StatsSnapshot {
        shop_id: shop_id.to_string(),
        today,
        week,
        month,
        last_updated: now,
    })
}

fn read_snapshot_sync(conn: &Connection, shop_id: &str) -> Result<Option<StatsSnapshot>> {
    let mut stmt = conn.prepare(
        r#"SELECT
             CAST(today_at_risk AS VARCHAR), CAST(today_recovered AS VARCHAR),
             today_recovery_rate, today_abandoned_count, today_recovered_count,
             CAST(week_at_risk AS VARCHAR), CAST(week_recovered AS VARCHAR),
             week_recovery_rate, week_abandoned_count, week_recovered_count,
             CAST(month_at_risk AS VARCHAR), CAST(month_recovered AS VARCHAR),
             month_recovery_rate, month_abandoned_count, month_recovered_count,
             CAST(last_updated AS VARCHAR)
           FROM revenue_stats_cache
           WHERE shop_id = ?1"#,
    )?;

    let row = stmt.query_row(duckdb::params![shop_id], |row| {
        Ok(RawSnapshotRow {
            today: raw_window(row, 0)?,
            week: raw_window(row, 5)?,
            month: raw_window(row, 10)?,
            last_updated: row.get(15)?,
        })
    });

    match row {
        Ok(raw) => Ok(Some(raw.into_snapshot(shop_id)?)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct RawWindow {
    at_risk: String,
    recovered: String,
    recovery_rate: f64,
    abandoned_count: i64,
    recovered_count: i64,
}

fn raw_window(row: &duckdb::Row<'_>, base: usize) -> duckdb::Result<RawWindow> {
    Ok(RawWindow {
        at_risk: row.get(base)?,
        recovered: row.get(base + 1)?,
        recovery_rate: row.get(base + 2)?,
        abandoned_count: row.get(base + 3)?,
        recovered_count: row.get(base + 4)?,
    })
}

struct RawSnapshotRow {
    today: RawWindow,
    week: RawWindow,
    month: RawWindow,
    last_updated: String,
}

impl RawSnapshotRow {
    fn into_snapshot(self, shop_id: &str) -> Result<StatsSnapshot> {
        Ok(StatsSnapshot {
            shop_id: shop_id.to_string(),
            today: parse_window(self.today)?,
            week: parse_window(self.week)?,
            month: parse_window(self.month)?,
            last_updated: parse_ts(&self.last_updated)?,
        })
    }
}

fn parse_window(raw: RawWindow) -> Result<WindowStats> {
    Ok(WindowStats {
        at_risk: parse_dec(&raw.at_risk)?,
        recovered: parse_dec(&raw.recovered)?,
        recovery_rate: raw.recovery_rate,
        abandoned_count: raw.abandoned_count,
        recovered_count: raw.recovered_count,
    })
}
