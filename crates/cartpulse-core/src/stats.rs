use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The reporting window a dashboard asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Today,
    Week,
    Month,
}

impl Period {
    /// Parse the `period` query parameter. Absent or empty defaults to `today`.
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") | Some("today") => Ok(Self::Today),
            Some("week") => Ok(Self::Week),
            Some("month") => Ok(Self::Month),
            Some(other) => Err(format!(
                "period must be one of: today, week, month (got {other:?})"
            )),
        }
    }
}

/// Aggregated totals for one time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    /// Sum of cart value over unrecovered abandonments in the window.
    pub at_risk: Decimal,
    /// Sum of recorded recovery value over recovered abandonments in the
    /// window.
    pub recovered: Decimal,
    /// recovered_count / abandoned_count x 100, one decimal, 0 when empty.
    pub recovery_rate: f64,
    pub abandoned_count: i64,
    pub recovered_count: i64,
}

impl WindowStats {
    pub fn zero() -> Self {
        Self {
            at_risk: Decimal::ZERO,
            recovered: Decimal::ZERO,
            recovery_rate: 0.0,
            abandoned_count: 0,
            recovered_count: 0,
        }
    }
}

/// Compute the recovery rate as a percentage rounded to one decimal place.
pub fn recovery_rate(recovered_count: i64, abandoned_count: i64) -> f64 {
    if abandoned_count == 0 {
        return 0.0;
    }
    let rate = recovered_count as f64 / abandoned_count as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// The per-shop cached snapshot: three windows computed from the same
/// point-in-time read of the event store, sharing one `last_updated`.
///
/// A derived, disposable projection — it can be dropped and rebuilt at any
/// time without data loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub shop_id: String,
    pub today: WindowStats,
    pub week: WindowStats,
    pub month: WindowStats,
    pub last_updated: DateTime<Utc>,
}

impl StatsSnapshot {
    pub fn window(&self, period: Period) -> &WindowStats {
        match period {
            Period::Today => &self.today,
            Period::Week => &self.week,
            Period::Month => &self.month,
        }
    }

    /// An all-zero snapshot for a shop with no events yet.
    pub fn empty(shop_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            shop_id: shop_id.to_string(),
            today: WindowStats::zero(),
            week: WindowStats::zero(),
            month: WindowStats::zero(),
            last_updated: now,
        }
    }
}
