//! Poll records: create, list, and read with live counts.

use std::sync::Arc;

use crate::domain::{NewPoll, OptionTally, PollId, PollWithResults};
use crate::error::GatewayError;
use crate::store::TallyStore;

/// Thin service over the store for poll record management.
#[derive(Debug, Clone)]
pub struct PollService {
    store: Arc<dyn TallyStore>,
}

impl PollService {
    /// Creates a new `PollService`.
    #[must_use]
    pub fn new(store: Arc<dyn TallyStore>) -> Self {
        Self { store }
    }

    /// Validates and creates a poll with its option set.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the question or any
    /// option is blank, there are no options, or the creator id is not
    /// positive; [`GatewayError::Storage`] on backend failure.
    pub async fn create_poll(&self, mut poll: NewPoll) -> Result<PollWithResults, GatewayError> {
        poll.question = poll.question.trim().to_string();
        if poll.question.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }
        if !poll.creator_id.is_valid() {
            return Err(GatewayError::InvalidRequest(
                "creatorId must be a positive integer".to_string(),
            ));
        }
        if poll.options.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "at least one option is required".to_string(),
            ));
        }
        for text in &mut poll.options {
            *text = text.trim().to_string();
            if text.is_empty() {
                return Err(GatewayError::InvalidRequest(
                    "option text must not be empty".to_string(),
                ));
            }
        }

        let created = self.store.create_poll(poll).await?;
        tracing::info!(
            poll_id = %created.poll.id,
            options = created.options.len(),
            "poll created"
        );
        Ok(created)
    }

    /// Returns one poll with its current counts.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PollNotFound`] if the poll does not exist.
    pub async fn get_poll(&self, poll_id: PollId) -> Result<PollWithResults, GatewayError> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(GatewayError::PollNotFound(poll_id))?;
        let options = self.store.list_options_with_counts(poll_id).await?;
        Ok(PollWithResults { poll, options })
    }

    /// Returns all polls with their current counts.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] on backend failure.
    pub async fn list_polls(&self) -> Result<Vec<PollWithResults>, GatewayError> {
        let polls = self.store.list_polls().await?;
        let mut detailed = Vec::with_capacity(polls.len());
        for poll in polls {
            let options = self.store.list_options_with_counts(poll.id).await?;
            detailed.push(PollWithResults { poll, options });
        }
        Ok(detailed)
    }

    /// Returns the current tally of one poll.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PollNotFound`] if the poll does not exist.
    pub async fn results(&self, poll_id: PollId) -> Result<Vec<OptionTally>, GatewayError> {
        Ok(self.get_poll(poll_id).await?.options)
    }

    /// Returns `true` if the backing store answers.
    pub async fn store_reachable(&self) -> bool {
        self.store.ping().await
    }
}
