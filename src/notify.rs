use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::state::AppState;

const CHANNEL_CAPACITY: usize = 64;

/// Events pushed to connected real-time clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    NewUser { username: String },
}

/// Best-effort fan-out to currently connected subscribers. No backlog, no
/// replay: clients connecting after a publish never see it.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Event>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Deliver `event` to everyone connected right now. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: Event) {
        match self.tx.send(event) {
            Ok(n) => debug!(subscribers = n, "event published"),
            Err(_) => debug!("event published with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// `GET /ws`: upgrade and stream events to the client as JSON text frames.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.notifier.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<Event>) {
    debug!("websocket client connected");
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            warn!(error = %e, "failed to serialize event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                // Slow clients skip missed events rather than disconnecting.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Nothing inbound is expected on this channel.
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("websocket client disconnected");
}
