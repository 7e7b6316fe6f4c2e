use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — permissive CORS: the tracking calls come from the
///    storefront script embedded on merchants' sites, so browsers need CORS
///    headers on cross-origin POSTs.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/revenue/track-abandonment",
            post(routes::track::track_abandonment),
        )
        .route(
            "/api/revenue/track-recovery",
            post(routes::track::track_recovery),
        )
        .route("/api/revenue/stats", get(routes::stats::get_stats))
        .route(
            "/api/revenue/activity-feed",
            get(routes::activity::get_activity_feed),
        )
        .route(
            "/api/revenue/hourly-breakdown",
            get(routes::hourly::get_hourly_breakdown),
        )
        .route(
            "/api/revenue/top-popups",
            get(routes::top_popups::get_top_popups),
        )
        .route(
            "/api/revenue/conversion-breakdown",
            get(routes::conversion::get_conversion_breakdown),
        )
        .route("/api/revenue/ws", get(routes::ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
