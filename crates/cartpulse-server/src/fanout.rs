//! Per-shop publish/subscribe fan-out.
//!
//! Each shop gets a lazily created `tokio::sync::broadcast` channel keyed by
//! shop id. Delivery is best-effort and at-most-once per connection: a
//! subscriber that disconnects or lags simply misses messages, there is no
//! replay log. Publishing to a shop with no subscribers drops the message.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use cartpulse_core::event::CartItem;
use cartpulse_core::stats::WindowStats;

/// Bounded per-topic buffer; slow dashboard connections lag past this and
/// skip ahead rather than applying backpressure to the write path.
const TOPIC_CAPACITY: usize = 64;

/// The three message types ever pushed to dashboard subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShopMessage {
    #[serde(rename_all = "camelCase")]
    CartAbandoned {
        id: String,
        value: Decimal,
        items: Vec<CartItem>,
        location: Option<String>,
        device_type: Option<String>,
        traffic_source: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CartRecovered {
        id: String,
        value: Decimal,
        popup_id: Option<String>,
        recovery_method: String,
        timestamp: DateTime<Utc>,
    },
    /// Fresh `today` window, pushed after a recovery-triggered recompute.
    #[serde(rename_all = "camelCase")]
    StatsUpdated {
        #[serde(flatten)]
        stats: WindowStats,
    },
}

#[derive(Default)]
pub struct FanoutHub {
    topics: RwLock<HashMap<String, broadcast::Sender<ShopMessage>>>,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a shop's topic, creating it on first use. Each call returns an
    /// independent receiver; one connection subscribing twice to the same
    /// shop should reuse its first receiver (the WebSocket layer enforces
    /// that idempotency).
    pub async fn subscribe(&self, shop_id: &str) -> broadcast::Receiver<ShopMessage> {
        let mut topics = self.topics.write().await;
        topics
            .entry(shop_id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Best-effort broadcast to every current subscriber of the shop's
    /// topic. Never fails: no topic or no subscribers means the message is
    /// dropped.
    pub async fn publish(&self, shop_id: &str, message: ShopMessage) {
        let topics = self.topics.read().await;
        if let Some(tx) = topics.get(shop_id) {
            // send() errors only when there are zero receivers.
            let delivered = tx.send(message).unwrap_or(0);
            debug!(shop_id, delivered, "fan-out publish");
        }
    }

    /// Drop the shop's topic if its last subscriber is gone. Called after a
    /// connection leaves; skipping it is harmless (the entry is reused on
    /// the next subscribe).
    pub async fn release(&self, shop_id: &str) {
        let mut topics = self.topics.write().await;
        if let Some(tx) = topics.get(shop_id) {
            if tx.receiver_count() == 0 {
                topics.remove(shop_id);
            }
        }
    }

    /// Number of live topics, for tests and introspection.
    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }
}
