//! WebSocket connection loop.
//!
//! Each connection registers one listener with the [`TopicHub`], then
//! multiplexes client commands and queued vote updates until either side
//! goes away. On exit the listener is removed from every topic.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::messages::{ClientMessage, ServerMessage};
use crate::domain::{ListenerId, TopicHub};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads join/leave commands from the client and applies them to the hub.
/// - Forwards vote updates from the listener queue to the client.
pub async fn run_connection(socket: WebSocket, hub: Arc<TopicHub>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut listener = hub.connect().await;
    let listener_id = listener.id();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(text.as_str(), &hub, listener_id).await;
                        if ws_tx.send(Message::text(reply)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(listener = %listener_id, error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Vote update queued by the hub
            event = listener.recv() => {
                let Some(event) = event else {
                    break;
                };
                match serde_json::to_string(event.as_ref()) {
                    Ok(json) => {
                        tracing::trace!(
                            listener = %listener_id,
                            poll_id = %event.poll_id(),
                            "forwarding update"
                        );
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(listener = %listener_id, error = %e, "failed to encode event");
                    }
                }
            }
        }
    }

    let dropped = hub.unsubscribe_all(listener_id).await;
    tracing::debug!(listener = %listener_id, dropped, "ws connection closed");
}

/// Applies one client message to the hub and returns the JSON reply.
async fn handle_text_message(text: &str, hub: &TopicHub, listener: ListenerId) -> String {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::JoinPoll { poll_id } | ClientMessage::LeavePoll { poll_id })
            if !poll_id.is_valid() =>
        {
            ServerMessage::Error {
                message: "pollId must be a positive integer".to_string(),
            }
        }
        Ok(ClientMessage::JoinPoll { poll_id }) => {
            hub.subscribe(listener, poll_id).await;
            tracing::debug!(%listener, %poll_id, "joined poll");
            ServerMessage::Joined { poll_id }
        }
        Ok(ClientMessage::LeavePoll { poll_id }) => {
            hub.unsubscribe(listener, poll_id).await;
            tracing::debug!(%listener, %poll_id, "left poll");
            ServerMessage::Left { poll_id }
        }
        Err(e) => ServerMessage::Error {
            message: format!("malformed message: {e}"),
        },
    };
    serde_json::to_string(&reply).unwrap_or_default()
}
