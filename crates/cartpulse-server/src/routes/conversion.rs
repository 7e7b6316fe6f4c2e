use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{error::AppError, routes::require_shop_id, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionQuery {
    pub shop_id: Option<String>,
}

/// `GET /api/revenue/conversion-breakdown?shopId` — recovery counts and
/// value grouped by method, with integer percentages of total recoveries.
pub async fn get_conversion_breakdown(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConversionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let shop_id = require_shop_id(query.shop_id.as_deref())?;

    let breakdown = state
        .db
        .conversion_breakdown(&shop_id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(breakdown))
}
