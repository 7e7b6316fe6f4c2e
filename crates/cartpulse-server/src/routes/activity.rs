use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::AppError,
    routes::{clamp_limit, require_shop_id},
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub shop_id: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/revenue/activity-feed?shopId&limit` — most recent events,
/// newest first, with read-time relative ages.
pub async fn get_activity_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, AppError> {
    let shop_id = require_shop_id(query.shop_id.as_deref())?;
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);

    let feed = state
        .db
        .activity_feed(&shop_id, limit, Utc::now())
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(feed))
}
