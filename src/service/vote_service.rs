//! Vote admission: validate, commit once, recompute tallies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use super::ResultPublisher;
use crate::config::duration_millis;
use crate::domain::{OptionId, OptionTally, PollId, UserId, VoteId};
use crate::error::GatewayError;
use crate::store::{StoreError, TallyStore};

/// Result of a successfully admitted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    /// Identifier of the committed vote.
    pub vote_id: VoteId,
    /// Poll the vote was cast in.
    pub poll_id: PollId,
    /// Tallies recomputed right after the commit.
    pub results: Vec<OptionTally>,
}

/// Admission controller for votes.
///
/// Enforces one vote per user per poll by attempting the insert and
/// letting the store's uniqueness constraint decide; there is no read
/// before the write. Storage calls are bounded by a timeout, and a call
/// that failed before reaching the backend is retried once.
#[derive(Debug, Clone)]
pub struct VoteService {
    store: Arc<dyn TallyStore>,
    publisher: Arc<ResultPublisher>,
    storage_timeout: Duration,
}

impl VoteService {
    /// Creates a new `VoteService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn TallyStore>,
        publisher: Arc<ResultPublisher>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            storage_timeout,
        }
    }

    /// Admits a vote and returns the fresh tallies. Does not broadcast.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] if either id is not positive.
    /// - [`GatewayError::OptionNotFound`] if the option does not exist.
    /// - [`GatewayError::DuplicateVote`] if the user already voted in the
    ///   option's poll.
    /// - [`GatewayError::Storage`] on backend failure or timeout before the
    ///   vote was committed.
    /// - [`GatewayError::TallyUnavailable`] if the vote was committed but
    ///   the tally could not be read afterwards.
    pub async fn submit_vote(
        &self,
        user_id: UserId,
        option_id: OptionId,
    ) -> Result<VoteReceipt, GatewayError> {
        let (vote_id, poll_id) = self.admit(user_id, option_id).await?;
        let results = self.tally_after_commit(vote_id, poll_id).await?;
        Ok(VoteReceipt {
            vote_id,
            poll_id,
            results,
        })
    }

    /// Admits a vote, then hands the tallies to the [`ResultPublisher`].
    ///
    /// Everything after the commit runs on a spawned task, so the update
    /// is broadcast even if the caller stops waiting. The receipt does not
    /// depend on broadcast delivery: per-listener failures are logged by
    /// the publisher and never surface here.
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit_vote`]. Nothing is broadcast unless the vote
    /// was committed.
    pub async fn cast_vote(
        &self,
        user_id: UserId,
        option_id: OptionId,
    ) -> Result<VoteReceipt, GatewayError> {
        let (vote_id, poll_id) = self.admit(user_id, option_id).await?;

        let service = self.clone();
        let after_commit = tokio::spawn(async move {
            let tally = service.tally_after_commit(vote_id, poll_id).await;
            let fallback = tally.as_ref().map(Clone::clone).unwrap_or_default();
            let _ = service.publisher.on_vote_admitted(poll_id, fallback).await;
            tally
        });

        let results = match after_commit.await {
            Ok(tally) => tally?,
            Err(e) => {
                tracing::error!(%vote_id, %poll_id, error = %e, "post-commit task failed");
                return Err(GatewayError::TallyUnavailable(vote_id));
            }
        };
        Ok(VoteReceipt {
            vote_id,
            poll_id,
            results,
        })
    }

    /// Validates the ids, resolves the option's poll and commits the vote.
    async fn admit(
        &self,
        user_id: UserId,
        option_id: OptionId,
    ) -> Result<(VoteId, PollId), GatewayError> {
        if !user_id.is_valid() {
            return Err(GatewayError::InvalidRequest(
                "userId must be a positive integer".to_string(),
            ));
        }
        if !option_id.is_valid() {
            return Err(GatewayError::InvalidRequest(
                "pollOptionId must be a positive integer".to_string(),
            ));
        }

        let option = self
            .bounded("find_poll_option", || self.store.find_poll_option(option_id))
            .await?
            .ok_or(GatewayError::OptionNotFound(option_id))?;
        let poll_id = option.poll_id;

        let vote_id = match self
            .bounded("persist_vote", || self.store.persist_vote(user_id, option_id))
            .await
        {
            Ok(id) => id,
            Err(StoreError::DuplicateVote) => {
                tracing::info!(%user_id, %poll_id, "duplicate vote rejected");
                return Err(GatewayError::DuplicateVote);
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(%vote_id, %user_id, %poll_id, %option_id, "vote admitted");
        Ok((vote_id, poll_id))
    }

    /// Reads the tally of a poll whose vote is already committed.
    ///
    /// The read has no side effect, so any failure, timeouts included, is
    /// retried once. A failure after that is reported as
    /// [`GatewayError::TallyUnavailable`], never as a retryable storage
    /// error: the vote stands.
    async fn tally_after_commit(
        &self,
        vote_id: VoteId,
        poll_id: PollId,
    ) -> Result<Vec<OptionTally>, GatewayError> {
        let read = || self.store.list_options_with_counts(poll_id);
        match self.bounded("list_options_with_counts", read).await {
            Ok(results) => return Ok(results),
            Err(e) => {
                tracing::warn!(%vote_id, %poll_id, error = %e, "tally read failed, retrying");
            }
        }
        self.bounded("list_options_with_counts", read)
            .await
            .map_err(|e| {
                tracing::error!(%vote_id, %poll_id, error = %e, "vote committed but tally failed");
                GatewayError::TallyUnavailable(vote_id)
            })
    }

    /// Runs one storage call under the configured timeout, retrying once
    /// when the store reports the call never reached the backend.
    async fn bounded<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut retried = false;
        loop {
            match tokio::time::timeout(self.storage_timeout, call()).await {
                Err(_) => {
                    tracing::warn!(
                        op,
                        timeout_ms = duration_millis(self.storage_timeout),
                        "storage call timed out"
                    );
                    return Err(StoreError::Backend(format!("{op} timed out")));
                }
                Ok(Err(e)) if e.is_retryable() && !retried => {
                    tracing::warn!(op, error = %e, "storage unavailable, retrying once");
                    retried = true;
                }
                Ok(result) => return result,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use super::*;
    use crate::domain::{Listener, NewPoll, Poll, PollEvent, PollOption, PollWithResults, TopicHub};
    use crate::store::InMemoryTallyStore;

    fn fruit_poll() -> NewPoll {
        NewPoll {
            question: "Best fruit".to_string(),
            is_published: true,
            creator_id: UserId::new(1),
            options: vec!["Apple".to_string(), "Banana".to_string()],
        }
    }

    fn service_over(store: Arc<dyn TallyStore>) -> (VoteService, Arc<TopicHub>) {
        let hub = Arc::new(TopicHub::new(64));
        let timeout = Duration::from_secs(2);
        let publisher = Arc::new(ResultPublisher::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            timeout,
        ));
        (VoteService::new(store, publisher, timeout), hub)
    }

    async fn seeded() -> (VoteService, Arc<TopicHub>, PollWithResults) {
        let store = Arc::new(InMemoryTallyStore::new());
        let Ok(poll) = store.create_poll(fruit_poll()).await else {
            panic!("poll creation failed");
        };
        let (service, hub) = service_over(store);
        (service, hub, poll)
    }

    fn counts(results: &[OptionTally]) -> Vec<i64> {
        results.iter().map(|t| t.votes).collect()
    }

    #[tokio::test]
    async fn first_vote_is_admitted_with_fresh_tally() {
        let (service, _, poll) = seeded().await;
        let Some(apple) = poll.options.first() else {
            panic!("missing option");
        };

        let Ok(receipt) = service.submit_vote(UserId::new(1), apple.id).await else {
            panic!("vote rejected");
        };
        assert_eq!(receipt.poll_id, poll.poll.id);
        assert_eq!(counts(&receipt.results), vec![1, 0]);
    }

    #[tokio::test]
    async fn second_vote_in_poll_is_duplicate() {
        let (service, _, poll) = seeded().await;
        let [apple, banana] = poll.options.as_slice() else {
            panic!("expected two options");
        };
        let user = UserId::new(1);

        assert!(service.submit_vote(user, apple.id).await.is_ok());
        let second = service.submit_vote(user, banana.id).await;
        assert!(matches!(second, Err(GatewayError::DuplicateVote)));
    }

    #[tokio::test]
    async fn non_positive_ids_fail_validation() {
        let (service, _, _) = seeded().await;
        let result = service.submit_vote(UserId::new(0), OptionId::new(1)).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));

        let result = service.submit_vote(UserId::new(1), OptionId::new(-1)).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unknown_option_is_not_found_and_not_broadcast() {
        let (service, hub, poll) = seeded().await;
        let mut listener = hub.connect().await;
        hub.subscribe(listener.id(), poll.poll.id).await;

        let result = service.cast_vote(UserId::new(1), OptionId::new(999)).await;
        assert!(matches!(result, Err(GatewayError::OptionNotFound(_))));
        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn concurrent_same_user_votes_admit_exactly_one() {
        let (service, _, poll) = seeded().await;
        let option_ids: Vec<OptionId> = poll.options.iter().map(|o| o.id).collect();

        let mut handles = Vec::new();
        for attempt in 0..20_usize {
            let service = service.clone();
            let option = option_ids
                .get(attempt % option_ids.len())
                .copied()
                .unwrap_or(OptionId::new(1));
            handles.push(tokio::spawn(async move {
                service.cast_vote(UserId::new(42), option).await
            }));
        }

        let mut admitted = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => admitted += 1,
                Ok(Err(GatewayError::DuplicateVote)) => duplicates += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(duplicates, 19);
    }

    #[tokio::test]
    async fn concurrent_votes_by_different_users_all_succeed() {
        let (service, _, poll) = seeded().await;
        let [apple, banana] = poll.options.as_slice() else {
            panic!("expected two options");
        };
        let (a, b) = (apple.id, banana.id);

        let first = tokio::spawn({
            let service = service.clone();
            async move { service.cast_vote(UserId::new(1), a).await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            async move { service.cast_vote(UserId::new(2), b).await }
        });
        assert!(matches!(first.await, Ok(Ok(_))));
        assert!(matches!(second.await, Ok(Ok(_))));

        let Ok(receipt) = service.submit_vote(UserId::new(3), a).await else {
            panic!("third vote rejected");
        };
        assert_eq!(counts(&receipt.results), vec![2, 1]);
    }

    /// Store that reports "unavailable" for the first `failures` inserts,
    /// fails the first `tally_failures` tally reads, and holds every tally
    /// read until `tally_gate` has a permit.
    #[derive(Debug)]
    struct FlakyStore {
        inner: InMemoryTallyStore,
        failures: AtomicUsize,
        tally_failures: AtomicUsize,
        tally_gate: Semaphore,
        tally_reading: Notify,
    }

    impl FlakyStore {
        fn new(failures: usize, tally_failures: usize, gate_permits: usize) -> Self {
            Self {
                inner: InMemoryTallyStore::new(),
                failures: AtomicUsize::new(failures),
                tally_failures: AtomicUsize::new(tally_failures),
                tally_gate: Semaphore::new(gate_permits),
                tally_reading: Notify::new(),
            }
        }
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[async_trait]
    impl TallyStore for FlakyStore {
        async fn find_poll_option(
            &self,
            option_id: OptionId,
        ) -> Result<Option<PollOption>, StoreError> {
            self.inner.find_poll_option(option_id).await
        }

        async fn persist_vote(
            &self,
            user_id: UserId,
            option_id: OptionId,
        ) -> Result<VoteId, StoreError> {
            if take_one(&self.failures) {
                return Err(StoreError::Unavailable("pool timed out".to_string()));
            }
            self.inner.persist_vote(user_id, option_id).await
        }

        async fn list_options_with_counts(
            &self,
            poll_id: PollId,
        ) -> Result<Vec<OptionTally>, StoreError> {
            self.tally_reading.notify_one();
            let Ok(_permit) = self.tally_gate.acquire().await else {
                return Err(StoreError::Backend("gate closed".to_string()));
            };
            if take_one(&self.tally_failures) {
                return Err(StoreError::Backend("read failed".to_string()));
            }
            self.inner.list_options_with_counts(poll_id).await
        }

        async fn create_poll(&self, poll: NewPoll) -> Result<PollWithResults, StoreError> {
            self.inner.create_poll(poll).await
        }

        async fn get_poll(&self, poll_id: PollId) -> Result<Option<Poll>, StoreError> {
            self.inner.get_poll(poll_id).await
        }

        async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
            self.inner.list_polls().await
        }
    }

    async fn flaky_setup(
        store: FlakyStore,
    ) -> (VoteService, Arc<TopicHub>, Arc<FlakyStore>, PollWithResults) {
        let store = Arc::new(store);
        let Ok(poll) = store.inner.create_poll(fruit_poll()).await else {
            panic!("poll creation failed");
        };
        let (service, hub) = service_over(Arc::clone(&store) as Arc<dyn TallyStore>);
        (service, hub, store, poll)
    }

    async fn flaky(failures: usize) -> (VoteService, OptionId) {
        let (service, _, _, poll) = flaky_setup(FlakyStore::new(failures, 0, 64)).await;
        let Some(option) = poll.options.first() else {
            panic!("missing option");
        };
        (service, option.id)
    }

    async fn next_counts(listener: &mut Listener) -> Vec<i64> {
        match tokio::time::timeout(Duration::from_secs(2), listener.recv()).await {
            Ok(Some(event)) => {
                let PollEvent::VoteUpdate { results, .. } = event.as_ref();
                counts(results)
            }
            _ => panic!("expected a vote update"),
        }
    }

    #[tokio::test]
    async fn unavailable_store_is_retried_once() {
        let (service, option) = flaky(1).await;
        assert!(service.submit_vote(UserId::new(1), option).await.is_ok());
    }

    #[tokio::test]
    async fn repeated_unavailability_surfaces_storage_error() {
        let (service, option) = flaky(2).await;
        let result = service.submit_vote(UserId::new(1), option).await;
        assert!(matches!(result, Err(GatewayError::Storage(_))));
    }

    #[tokio::test]
    async fn failed_tally_read_after_commit_is_retried() {
        let (service, hub, _, poll) = flaky_setup(FlakyStore::new(0, 1, 64)).await;
        let Some(apple) = poll.options.first() else {
            panic!("missing option");
        };
        let mut listener = hub.connect().await;
        hub.subscribe(listener.id(), poll.poll.id).await;

        let Ok(receipt) = service.cast_vote(UserId::new(1), apple.id).await else {
            panic!("committed vote reported as failed");
        };
        assert_eq!(counts(&receipt.results), vec![1, 0]);
        assert_eq!(next_counts(&mut listener).await, vec![1, 0]);
    }

    #[tokio::test]
    async fn committed_vote_is_broadcast_when_admission_tally_fails() {
        let (service, hub, store, poll) = flaky_setup(FlakyStore::new(0, 2, 64)).await;
        let Some(apple) = poll.options.first() else {
            panic!("missing option");
        };
        let mut listener = hub.connect().await;
        hub.subscribe(listener.id(), poll.poll.id).await;

        let first = service.cast_vote(UserId::new(1), apple.id).await;
        assert!(matches!(first, Err(GatewayError::TallyUnavailable(_))));
        assert_eq!(next_counts(&mut listener).await, vec![1, 0]);

        let Ok(committed) = store.inner.list_options_with_counts(poll.poll.id).await else {
            panic!("tally read failed");
        };
        assert_eq!(counts(&committed), vec![1, 0]);

        let retry = service.cast_vote(UserId::new(1), apple.id).await;
        assert!(matches!(retry, Err(GatewayError::DuplicateVote)));
    }

    #[tokio::test]
    async fn broadcast_survives_dropped_request() {
        let (service, hub, store, poll) = flaky_setup(FlakyStore::new(0, 0, 0)).await;
        let Some(apple) = poll.options.first() else {
            panic!("missing option");
        };
        let apple = apple.id;
        let mut listener = hub.connect().await;
        hub.subscribe(listener.id(), poll.poll.id).await;

        let request =
            tokio::spawn(async move { service.cast_vote(UserId::new(1), apple).await });

        // The vote is committed once the tally read starts.
        store.tally_reading.notified().await;
        request.abort();
        store.tally_gate.add_permits(64);

        assert_eq!(next_counts(&mut listener).await, vec![1, 0]);
    }
}
