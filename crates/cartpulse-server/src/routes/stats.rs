use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartpulse_core::stats::{Period, WindowStats};

use crate::{error::AppError, routes::require_shop_id, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub shop_id: Option<String>,
    pub period: Option<String>,
}

/// The requested period's slice of the snapshot, plus the shared
/// `lastUpdated` so dashboards can show cache age.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub window: WindowStats,
    pub last_updated: DateTime<Utc>,
}

/// `GET /api/revenue/stats?shopId&period=today|week|month`
///
/// Reads through the stats cache: a fresh snapshot is served as-is, an
/// absent or stale one triggers a recompute of all three windows first.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let shop_id = require_shop_id(query.shop_id.as_deref())?;
    let period = Period::parse(query.period.as_deref()).map_err(AppError::BadRequest)?;

    let snapshot = state
        .db
        .get_stats(&shop_id, Utc::now(), state.config.staleness())
        .await?;

    Ok(Json(StatsResponse {
        window: snapshot.window(period).clone(),
        last_updated: snapshot.last_updated,
    }))
}
