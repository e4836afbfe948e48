//! Events fanned out to poll subscribers.
//!
//! Every admitted vote produces a [`PollEvent`] that the
//! [`crate::service::ResultPublisher`] pushes through the
//! [`super::TopicHub`]. Events carry a full tally snapshot rather than a
//! delta, so a listener that misses one update is corrected by the next.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{OptionTally, PollId};

/// Domain event delivered to every listener subscribed to a poll.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PollEvent {
    /// Emitted after a vote has been committed for the poll.
    VoteUpdate {
        /// Poll whose tally changed.
        poll_id: PollId,
        /// Options in creation order with counts recomputed from committed
        /// votes.
        results: Vec<OptionTally>,
        /// Time the snapshot was taken.
        timestamp: DateTime<Utc>,
    },
}

impl PollEvent {
    /// Builds a vote update stamped with the current time.
    #[must_use]
    pub fn vote_update(poll_id: PollId, results: Vec<OptionTally>) -> Self {
        Self::VoteUpdate {
            poll_id,
            results,
            timestamp: Utc::now(),
        }
    }

    /// Returns the poll ID associated with this event.
    #[must_use]
    pub fn poll_id(&self) -> PollId {
        match self {
            Self::VoteUpdate { poll_id, .. } => *poll_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OptionId;

    #[test]
    fn vote_update_serializes_wire_shape() {
        let event = PollEvent::vote_update(
            PollId::new(3),
            vec![OptionTally {
                id: OptionId::new(1),
                text: "Apple".to_string(),
                votes: 1,
            }],
        );
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], "voteUpdate");
        assert_eq!(json["pollId"], 3);
        assert_eq!(json["results"][0]["text"], "Apple");
        assert_eq!(json["results"][0]["votes"], 1);
    }

    #[test]
    fn poll_id_accessor() {
        let event = PollEvent::vote_update(PollId::new(8), Vec::new());
        assert_eq!(event.poll_id(), PollId::new(8));
    }
}
