//! Tally store: durable polls, options and votes.
//!
//! [`TallyStore`] is the storage seam consumed by the service layer. It
//! owns the one-vote-per-(user, poll) uniqueness constraint and derives
//! every count from committed vote records at read time. Two backends are
//! provided: [`InMemoryTallyStore`] for tests and ephemeral deployments,
//! and [`PostgresTallyStore`] backed by `sqlx::PgPool`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{
    NewPoll, OptionId, OptionTally, Poll, PollId, PollOption, PollWithResults, UserId, VoteId,
};

pub use memory::InMemoryTallyStore;
pub use postgres::PostgresTallyStore;

/// Errors surfaced by a [`TallyStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The (user, poll) uniqueness constraint rejected the insert.
    #[error("user has already voted in this poll")]
    DuplicateVote,

    /// The referenced option does not exist.
    #[error("poll option not found: {0}")]
    OptionNotFound(OptionId),

    /// The backend could not be reached and nothing was sent to it.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if the failed call certainly had no effect and may be
    /// issued again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Storage interface for polls and votes.
///
/// Implementations must make [`TallyStore::persist_vote`] atomic: two
/// concurrent calls for the same user and poll commit exactly one vote and
/// the other returns [`StoreError::DuplicateVote`].
#[async_trait]
pub trait TallyStore: Send + Sync + std::fmt::Debug {
    /// Looks up an option and the poll that owns it.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn find_poll_option(&self, option_id: OptionId)
    -> Result<Option<PollOption>, StoreError>;

    /// Commits a vote for `option_id` by `user_id`.
    ///
    /// The owning poll is resolved inside the same atomic unit as the
    /// uniqueness check, so there is no window between check and insert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateVote`] if the user already voted in
    /// the option's poll, [`StoreError::OptionNotFound`] if the option does
    /// not exist, or another [`StoreError`] on backend failure.
    async fn persist_vote(&self, user_id: UserId, option_id: OptionId)
    -> Result<VoteId, StoreError>;

    /// Returns every option of `poll_id` in creation order with its count of
    /// committed votes. Unknown polls yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn list_options_with_counts(
        &self,
        poll_id: PollId,
    ) -> Result<Vec<OptionTally>, StoreError>;

    /// Creates a poll and its fixed option set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn create_poll(&self, poll: NewPoll) -> Result<PollWithResults, StoreError>;

    /// Fetches poll metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn get_poll(&self, poll_id: PollId) -> Result<Option<Poll>, StoreError>;

    /// Lists all polls ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError>;

    /// Returns `true` if the backend is reachable.
    async fn ping(&self) -> bool {
        true
    }

    /// Releases backend resources. Called once on shutdown.
    async fn close(&self) {}
}
