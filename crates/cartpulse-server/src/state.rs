use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

use cartpulse_core::config::Config;
use cartpulse_duckdb::DuckDbBackend;

use crate::fanout::{FanoutHub, ShopMessage};

/// A "shop touched" signal sent by the write path after a persist.
///
/// Consumed by the background refresh task, which recomputes the shop's
/// stats snapshot and, for recoveries, announces the fresh `today` window to
/// subscribers. Sending is fire-and-forget: a failure here never fails the
/// write that produced it.
#[derive(Debug)]
pub struct ShopTouch {
    pub shop_id: String,
    /// Publish `stats_updated` after the recompute (set on recoveries).
    pub announce_stats: bool,
}

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB event store. Internally `Arc<tokio::sync::Mutex<Connection>>`,
    /// so it is cheap to share and async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Per-shop real-time fan-out topics.
    pub hub: Arc<FanoutHub>,

    touch_tx: mpsc::UnboundedSender<ShopTouch>,
    /// Receiver half, taken exactly once by [`AppState::run_refresh_loop`].
    touch_rx: Mutex<Option<mpsc::UnboundedReceiver<ShopTouch>>>,
}

impl AppState {
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let (touch_tx, touch_rx) = mpsc::unbounded_channel();
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            hub: Arc::new(FanoutHub::new()),
            touch_tx,
            touch_rx: Mutex::new(Some(touch_rx)),
        }
    }

    /// Queue an asynchronous stats refresh for `shop_id`.
    ///
    /// Fire-and-forget by design: the caller's write has already committed,
    /// and a stale snapshot self-heals on the next read past the staleness
    /// threshold, so a send failure is logged and swallowed.
    pub fn touch(&self, shop_id: &str, announce_stats: bool) {
        let touch = ShopTouch {
            shop_id: shop_id.to_string(),
            announce_stats,
        };
        if self.touch_tx.send(touch).is_err() {
            warn!(shop_id, "stats refresh queue closed, dropping touch");
        }
    }

    /// Background loop: drain shop-touch signals and recompute snapshots.
    ///
    /// One touch at a time, which also serves as the single-flight guard —
    /// concurrent writes to the same shop queue multiple touches, and the
    /// later recomputes are harmless no-ops over unchanged data. Recompute
    /// failures are logged and swallowed; the cache is a disposable
    /// projection and the next read repairs it.
    pub async fn run_refresh_loop(self: Arc<Self>) {
        let rx = self.touch_rx.lock().await.take();
        let Some(mut rx) = rx else {
            error!("refresh loop started twice, exiting");
            return;
        };
        while let Some(touch) = rx.recv().await {
            let now = Utc::now();
            match self.db.recompute_snapshot(&touch.shop_id, now).await {
                Ok(snapshot) => {
                    if touch.announce_stats {
                        self.hub
                            .publish(
                                &touch.shop_id,
                                ShopMessage::StatsUpdated {
                                    stats: snapshot.today,
                                },
                            )
                            .await;
                    }
                }
                Err(e) => {
                    error!(shop_id = %touch.shop_id, error = %e, "background stats recompute failed");
                }
            }
        }
    }
}
