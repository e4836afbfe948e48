//! Domain layer: identifiers, poll records, events, and the topic hub.
//!
//! This module holds the server-side model shared by the store, the
//! service layer and the WebSocket layer: typed identifiers, poll and
//! tally records, the [`PollEvent`] pushed to subscribers, and the
//! [`TopicHub`] that owns poll subscriptions.

pub mod ids;
pub mod poll;
pub mod poll_event;
pub mod topic_hub;

pub use ids::{ListenerId, OptionId, PollId, UserId, VoteId};
pub use poll::{NewPoll, OptionTally, Poll, PollOption, PollWithResults, tallies_dominate};
pub use poll_event::PollEvent;
pub use topic_hub::{Listener, PublishReport, TopicHub};
