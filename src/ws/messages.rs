//! WebSocket message types.
//!
//! Every frame is a JSON object tagged by `type`. Vote updates are sent as
//! serialized [`crate::domain::PollEvent`]s and share the same tagging.

use serde::{Deserialize, Serialize};

use crate::domain::PollId;

/// Messages a client can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Start receiving vote updates for a poll.
    JoinPoll {
        /// Poll to join.
        poll_id: PollId,
    },
    /// Stop receiving vote updates for a poll.
    LeavePoll {
        /// Poll to leave.
        poll_id: PollId,
    },
}

/// Replies the server sends in response to client messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The client is now subscribed to the poll.
    Joined {
        /// Poll joined.
        poll_id: PollId,
    },
    /// The client is no longer subscribed to the poll.
    Left {
        /// Poll left.
        poll_id: PollId,
    },
    /// The client message could not be handled.
    Error {
        /// Human-readable reason.
        message: String,
    },
}
