use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{error::AppError, routes::require_shop_id, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyQuery {
    pub shop_id: Option<String>,
    /// Calendar day as `YYYY-MM-DD`; defaults to today (UTC).
    pub date: Option<String>,
}

/// `GET /api/revenue/hourly-breakdown?shopId&date?` — dense 24-bucket chart
/// data for one day.
pub async fn get_hourly_breakdown(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HourlyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let shop_id = require_shop_id(query.shop_id.as_deref())?;
    let date = match query.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest("date must be YYYY-MM-DD".to_string()))?,
        None => Utc::now().date_naive(),
    };

    let buckets = state
        .db
        .hourly_breakdown(&shop_id, date)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(buckets))
}
