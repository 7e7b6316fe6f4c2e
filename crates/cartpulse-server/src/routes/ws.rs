use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::fanout::ShopMessage;
use crate::state::AppState;

/// A client-driven membership message: `{"type": "...", "shopId": "..."}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    shop_id: Option<String>,
}

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// `GET /api/revenue/ws` — dashboard real-time channel.
///
/// After the upgrade, the client joins and leaves per-shop topics with
/// `subscribe` / `unsubscribe` messages; the server pushes `cart_abandoned`,
/// `cart_recovered` and `stats_updated` frames for every subscribed shop.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));

    // One forwarding task per subscribed shop; keyed by shop id so repeat
    // subscribes are no-ops and unsubscribe can abort exactly one task.
    let mut subscriptions: HashMap<String, JoinHandle<()>> = HashMap::new();

    drive_client(stream, &sink, &mut subscriptions, &state).await;

    // Connection gone: stop forwarding and let empty topics be pruned.
    for (shop_id, task) in subscriptions.drain() {
        task.abort();
        state.hub.release(&shop_id).await;
    }
}

async fn drive_client(
    mut stream: SplitStream<WebSocket>,
    sink: &SharedSink,
    subscriptions: &mut HashMap<String, JoinHandle<()>>,
    state: &Arc<AppState>,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(request) = serde_json::from_str::<ClientMessage>(&text) else {
                    warn!("unparseable websocket client message");
                    continue;
                };
                let Some(shop_id) = request.shop_id.filter(|s| !s.trim().is_empty()) else {
                    debug!(kind = %request.kind, "client message without shopId");
                    continue;
                };
                match request.kind.as_str() {
                    "subscribe" => {
                        // Idempotent: joining a topic twice keeps the first
                        // subscription.
                        if !subscriptions.contains_key(&shop_id) {
                            let rx = state.hub.subscribe(&shop_id).await;
                            let task = tokio::spawn(forward(rx, Arc::clone(sink)));
                            subscriptions.insert(shop_id.clone(), task);
                        }
                        let ack = json!({ "type": "subscribed", "shopId": shop_id });
                        if send_text(sink, ack.to_string()).await.is_err() {
                            break;
                        }
                    }
                    "unsubscribe" => {
                        if let Some(task) = subscriptions.remove(&shop_id) {
                            task.abort();
                            state.hub.release(&shop_id).await;
                        }
                        let ack = json!({ "type": "unsubscribed", "shopId": shop_id });
                        if send_text(sink, ack.to_string()).await.is_err() {
                            break;
                        }
                    }
                    other => debug!(kind = %other, "unhandled websocket client message"),
                }
            }
            Ok(Message::Ping(payload)) => {
                if sink.lock().await.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                debug!(?frame, "websocket closed by client");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                debug!(error = %e, "websocket receive error");
                break;
            }
        }
    }
}

/// Forward one shop topic to the connection until the topic closes or the
/// send fails. A lagged receiver skips ahead — delivery is at-most-once
/// with no replay.
async fn forward(mut rx: broadcast::Receiver<ShopMessage>, sink: SharedSink) {
    loop {
        match rx.recv().await {
            Ok(message) => {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize fan-out message");
                        continue;
                    }
                };
                if send_text(&sink, text).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "slow websocket subscriber lagged, skipping ahead");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send_text(sink: &SharedSink, text: String) -> Result<(), axum::Error> {
    sink.lock().await.send(Message::Text(text.into())).await
}
