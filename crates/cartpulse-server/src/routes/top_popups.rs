use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    routes::{clamp_limit, require_shop_id},
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 5;
const MAX_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPopupsQuery {
    pub shop_id: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/revenue/top-popups?shopId&limit` — popups ranked by total
/// recovered value.
pub async fn get_top_popups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopPopupsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let shop_id = require_shop_id(query.shop_id.as_deref())?;
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);

    let ranking = state
        .db
        .top_popups(&shop_id, limit)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(ranking))
}
