//! Read-side view rows returned by the query surface. All derived from the
//! event store at read time; none of these are persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::event::CartItem;

/// One entry in the live activity feed, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: String,
    /// "abandonment" or "recovery".
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub value: Decimal,
    pub items: Vec<CartItem>,
    pub location: Option<String>,
    pub device_type: Option<String>,
    pub traffic_source: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub recovered_via: Option<String>,
    pub popup_name: Option<String>,
    pub time_ago: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Abandonment,
    Recovery,
}

/// One of the 24 buckets returned by the hourly breakdown. The result is
/// always dense: hours 0-23 each appear exactly once, empty hours are zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    pub hour: u32,
    pub at_risk: Decimal,
    pub recovered: Decimal,
}

impl HourlyBucket {
    pub fn zero(hour: u32) -> Self {
        Self {
            hour,
            at_risk: Decimal::ZERO,
            recovered: Decimal::ZERO,
        }
    }
}

/// One row of the top-performing-popup ranking, ordered by total recovered
/// value descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPopup {
    pub popup_id: String,
    pub popup_name: String,
    pub recovery_count: i64,
    pub total_recovered: Decimal,
}

/// One row of the conversion-method breakdown across all recoveries for a
/// shop (no time window).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSlice {
    pub method: String,
    pub count: i64,
    /// Integer-rounded share of total recovery count.
    pub percentage: i64,
    pub total_value: Decimal,
}
