//! WebSocket layer: connection handling and message types.
//!
//! The endpoint at `/ws` lets clients join and leave poll topics and
//! receive a `voteUpdate` event whenever a vote is admitted for a poll
//! they joined.

pub mod connection;
pub mod handler;
pub mod messages;
