use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use cartpulse_core::event::{TrackAbandonment, TrackRecovery};

use crate::{error::AppError, fanout::ShopMessage, state::AppState};

/// `POST /api/revenue/track-abandonment` — ingest one detected abandonment.
///
/// Persists first; only then fans out `cart_abandoned` to the shop's
/// subscribers and queues the asynchronous stats refresh. Neither side
/// effect can fail the request — the fan-out is best-effort and the refresh
/// is fire-and-forget.
pub async fn track_abandonment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrackAbandonment>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let event = state.db.record_abandonment(&payload, now).await?;

    state
        .hub
        .publish(
            &event.shop_id,
            ShopMessage::CartAbandoned {
                id: event.id.clone(),
                value: event.cart_value,
                items: event.cart_items.clone(),
                location: event.user_location.clone(),
                device_type: event.device_type.clone(),
                traffic_source: event.traffic_source.clone(),
                timestamp: event.created_at,
            },
        )
        .await;
    state.touch(&event.shop_id, false);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "eventId": event.id })),
    ))
}

/// `POST /api/revenue/track-recovery` — a previously abandoned cart
/// converted to a purchase.
///
/// 404 when the abandonment does not exist for this shop, 409 when it was
/// already recovered. On success, fans out `cart_recovered` and queues a
/// stats refresh that will announce the fresh `today` window via
/// `stats_updated`.
pub async fn track_recovery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrackRecovery>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let recovery = state.db.record_recovery(&payload, now).await?;

    state
        .hub
        .publish(
            &recovery.shop_id,
            ShopMessage::CartRecovered {
                id: recovery.id.clone(),
                value: recovery.recovery_value,
                popup_id: recovery.popup_id.clone(),
                recovery_method: recovery.recovery_method.clone(),
                timestamp: recovery.created_at,
            },
        )
        .await;
    state.touch(&recovery.shop_id, true);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "recoveryId": recovery.id })),
    ))
}
