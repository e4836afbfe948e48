//! # pollcast-gateway
//!
//! REST API and WebSocket gateway for live single-choice polls.
//!
//! Users cast one vote per poll over HTTP; every client watching that poll
//! over WebSocket receives the recomputed tally as soon as the vote is
//! committed.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── VoteService ──► ResultPublisher (service/)
//!     ├── TopicHub (domain/)
//!     │
//!     └── TallyStore (store/): in-memory or PostgreSQL
//! ```
//!
//! The store's (user, poll) uniqueness constraint is the only
//! serialization point for admission. Tallies are always counted from
//! committed votes, never cached.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod store;
pub mod ws;
