//! # Real-time fan-out
//!
//! Every state change is serialized once and pushed through a broadcast
//! channel to each connected WebSocket. Delivery is best effort: a slow
//! viewer skips what it missed and nobody acknowledges anything.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use mh_core::{Notifier, RealtimeEvent};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::handlers::AppState;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub struct BroadcastNotifier {
    tx: broadcast::Sender<String>,
    /// Connected sockets and the user each one registered as, if any.
    sessions: DashMap<Uuid, Option<String>>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sessions: DashMap::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn connected(&self) -> usize {
        self.sessions.len()
    }

    /// User registered on a session, if any.
    pub fn session_user(&self, session: Uuid) -> Option<String> {
        self.sessions.get(&session).and_then(|u| u.value().clone())
    }

    fn open_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(id, None);
        id
    }

    fn register_user(&self, session: Uuid, user_id: String) {
        if let Some(mut entry) = self.sessions.get_mut(&session) {
            *entry = Some(user_id);
        }
    }

    fn close_session(&self, session: Uuid) -> Option<String> {
        self.sessions.remove(&session).and_then(|(_, user)| user)
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Notifier for BroadcastNotifier {
    fn broadcast(&self, event: RealtimeEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(e) => {
                warn!(event = event.name(), error = %e, "Dropping unserializable event");
                return;
            }
        };
        // No subscribers is not an error.
        let receivers = self.tx.send(payload).unwrap_or(0);
        debug!(event = event.name(), receivers, "Broadcast");
    }
}

/// Frames a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ClientMessage {
    RegisterUser { user_id: String },
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let notifier = state.realtime.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, notifier))
}

async fn handle_socket(socket: WebSocket, notifier: Arc<BroadcastNotifier>) {
    let session = notifier.open_session();
    info!(session = %session, "Viewer connected");

    let (mut sender, mut receiver) = socket.split();
    let mut events = notifier.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(payload) => {
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(session = %session, skipped, "Viewer lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let registry = notifier.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::RegisterUser { user_id }) => {
                        info!(session = %session, user = %user_id, "Viewer registered");
                        registry.register_user(session, user_id);
                    }
                    Err(e) => debug!(session = %session, error = %e, "Ignoring client frame"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let user = notifier.close_session(session);
    info!(session = %session, user = ?user, "Viewer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let notifier = BroadcastNotifier::new(8);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        let meme_id = Uuid::now_v7();
        notifier.broadcast(RealtimeEvent::BidUpdate {
            meme_id,
            credits: 25,
            user_id: "neonhacker".into(),
        });

        for rx in [&mut a, &mut b] {
            let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(frame["event"], "bid_update");
            assert_eq!(frame["payload"]["credits"], 25);
            assert_eq!(frame["payload"]["meme_id"], meme_id.to_string());
        }
    }

    #[test]
    fn test_broadcast_without_viewers_is_silent() {
        let notifier = BroadcastNotifier::default();
        notifier.broadcast(RealtimeEvent::VoteUpdate {
            meme_id: Uuid::now_v7(),
            upvotes: 1,
            user_vote: None,
        });
        assert_eq!(notifier.connected(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_receiving() {
        let notifier = BroadcastNotifier::new(2);
        let mut rx = notifier.subscribe();
        for upvotes in 0..5 {
            notifier.broadcast(RealtimeEvent::VoteUpdate {
                meme_id: Uuid::nil(),
                upvotes,
                user_vote: None,
            });
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        let next: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(next["payload"]["upvotes"], 3);
    }

    #[test]
    fn test_session_registry() {
        let notifier = BroadcastNotifier::default();
        let session = notifier.open_session();
        assert_eq!(notifier.connected(), 1);

        notifier.register_user(session, "synthwave99".into());
        assert_eq!(notifier.session_user(session).as_deref(), Some("synthwave99"));

        assert_eq!(notifier.close_session(session).as_deref(), Some("synthwave99"));
        assert_eq!(notifier.connected(), 0);
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"register_user","user_id":"matrixdoge"}"#).unwrap();
        let ClientMessage::RegisterUser { user_id } = msg;
        assert_eq!(user_id, "matrixdoge");

        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"dance"}"#).is_err());
    }
}
