//! Poll, option and tally records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{OptionId, PollId, UserId};

/// A single option as stored, without its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    /// Option identifier.
    pub id: OptionId,
    /// Poll this option belongs to.
    pub poll_id: PollId,
    /// Display text.
    pub text: String,
}

/// Per-option vote count, derived from committed votes at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OptionTally {
    /// Option identifier.
    pub id: OptionId,
    /// Display text.
    pub text: String,
    /// Number of committed votes for this option.
    pub votes: i64,
}

/// Poll metadata without options.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    /// Poll identifier.
    pub id: PollId,
    /// The question being asked.
    pub question: String,
    /// Whether the poll is visible to voters.
    pub is_published: bool,
    /// User that created the poll.
    pub creator_id: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a poll together with its fixed option set.
#[derive(Debug, Clone)]
pub struct NewPoll {
    /// The question being asked.
    pub question: String,
    /// Whether the poll is visible to voters.
    pub is_published: bool,
    /// User that creates the poll.
    pub creator_id: UserId,
    /// Option texts in display order.
    pub options: Vec<String>,
}

/// Poll metadata together with live per-option counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollWithResults {
    /// Poll metadata.
    #[serde(flatten)]
    pub poll: Poll,
    /// Options in creation order with their current counts.
    pub options: Vec<OptionTally>,
}

/// Returns `true` if no option in `next` has fewer votes than the same
/// option in `previous`.
///
/// Options missing from `next` count as a regression.
#[must_use]
pub fn tallies_dominate(next: &[OptionTally], previous: &[OptionTally]) -> bool {
    previous.iter().all(|prev| {
        next.iter()
            .find(|t| t.id == prev.id)
            .is_some_and(|t| t.votes >= prev.votes)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(id: i64, votes: i64) -> OptionTally {
        OptionTally {
            id: OptionId::new(id),
            text: format!("option {id}"),
            votes,
        }
    }

    #[test]
    fn equal_tallies_dominate() {
        let a = vec![tally(1, 2), tally(2, 0)];
        assert!(tallies_dominate(&a, &a));
    }

    #[test]
    fn lower_count_does_not_dominate() {
        let prev = vec![tally(1, 2), tally(2, 1)];
        let next = vec![tally(1, 3), tally(2, 0)];
        assert!(!tallies_dominate(&next, &prev));
    }

    #[test]
    fn anything_dominates_empty_history() {
        assert!(tallies_dominate(&[tally(1, 0)], &[]));
    }

    #[test]
    fn missing_option_is_a_regression() {
        assert!(!tallies_dominate(&[tally(1, 5)], &[tally(1, 1), tally(2, 0)]));
    }

    #[test]
    fn poll_option_serializes_camel_case() {
        let option = PollOption {
            id: OptionId::new(3),
            poll_id: PollId::new(9),
            text: "Apple".to_string(),
        };
        let json = serde_json::to_string(&option).unwrap_or_default();
        assert!(json.contains("\"pollId\":9"));
    }
}
