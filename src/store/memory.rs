//! In-memory tally store with per-poll fine-grained locking.
//!
//! Polls live in a `HashMap` where each entry is individually protected by
//! a [`tokio::sync::RwLock`]. Votes for different polls commit
//! concurrently; votes for the same poll are serialized on that poll's
//! write lock, which is where the (user, poll) uniqueness check happens.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{StoreError, TallyStore};
use crate::domain::{
    NewPoll, OptionId, OptionTally, Poll, PollId, PollOption, PollWithResults, UserId, VoteId,
};

#[derive(Debug)]
struct StoredVote {
    option_id: OptionId,
}

#[derive(Debug)]
struct PollEntry {
    poll: Poll,
    /// Options in creation order.
    options: Vec<(OptionId, String)>,
    votes: Vec<StoredVote>,
    voters: HashSet<UserId>,
}

impl PollEntry {
    fn tallies(&self) -> Vec<OptionTally> {
        self.options
            .iter()
            .map(|(id, text)| OptionTally {
                id: *id,
                text: text.clone(),
                votes: self.votes.iter().filter(|v| v.option_id == *id).count() as i64,
            })
            .collect()
    }
}

/// Process-local [`TallyStore`].
#[derive(Debug)]
pub struct InMemoryTallyStore {
    polls: RwLock<HashMap<PollId, Arc<RwLock<PollEntry>>>>,
    option_index: RwLock<HashMap<OptionId, PollId>>,
    next_poll_id: AtomicI64,
    next_option_id: AtomicI64,
    next_vote_id: AtomicI64,
}

impl InMemoryTallyStore {
    /// Creates an empty store. Identifiers start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            polls: RwLock::new(HashMap::new()),
            option_index: RwLock::new(HashMap::new()),
            next_poll_id: AtomicI64::new(1),
            next_option_id: AtomicI64::new(1),
            next_vote_id: AtomicI64::new(1),
        }
    }

    async fn entry(&self, poll_id: PollId) -> Option<Arc<RwLock<PollEntry>>> {
        self.polls.read().await.get(&poll_id).map(Arc::clone)
    }
}

impl Default for InMemoryTallyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TallyStore for InMemoryTallyStore {
    async fn find_poll_option(
        &self,
        option_id: OptionId,
    ) -> Result<Option<PollOption>, StoreError> {
        let Some(poll_id) = self.option_index.read().await.get(&option_id).copied() else {
            return Ok(None);
        };
        let Some(entry) = self.entry(poll_id).await else {
            return Ok(None);
        };
        let entry = entry.read().await;
        Ok(entry
            .options
            .iter()
            .find(|(id, _)| *id == option_id)
            .map(|(id, text)| PollOption {
                id: *id,
                poll_id,
                text: text.clone(),
            }))
    }

    async fn persist_vote(
        &self,
        user_id: UserId,
        option_id: OptionId,
    ) -> Result<VoteId, StoreError> {
        let poll_id = self
            .option_index
            .read()
            .await
            .get(&option_id)
            .copied()
            .ok_or(StoreError::OptionNotFound(option_id))?;
        let entry = self
            .entry(poll_id)
            .await
            .ok_or(StoreError::OptionNotFound(option_id))?;

        let mut entry = entry.write().await;
        if !entry.voters.insert(user_id) {
            return Err(StoreError::DuplicateVote);
        }
        entry.votes.push(StoredVote { option_id });
        Ok(VoteId::new(self.next_vote_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn list_options_with_counts(
        &self,
        poll_id: PollId,
    ) -> Result<Vec<OptionTally>, StoreError> {
        match self.entry(poll_id).await {
            Some(entry) => Ok(entry.read().await.tallies()),
            None => Ok(Vec::new()),
        }
    }

    async fn create_poll(&self, new_poll: NewPoll) -> Result<PollWithResults, StoreError> {
        let poll_id = PollId::new(self.next_poll_id.fetch_add(1, Ordering::Relaxed));
        let now = Utc::now();
        let poll = Poll {
            id: poll_id,
            question: new_poll.question,
            is_published: new_poll.is_published,
            creator_id: new_poll.creator_id,
            created_at: now,
            updated_at: now,
        };
        let options: Vec<(OptionId, String)> = new_poll
            .options
            .into_iter()
            .map(|text| {
                let id = OptionId::new(self.next_option_id.fetch_add(1, Ordering::Relaxed));
                (id, text)
            })
            .collect();

        let entry = PollEntry {
            poll: poll.clone(),
            options: options.clone(),
            votes: Vec::new(),
            voters: HashSet::new(),
        };
        let results = entry.tallies();

        // Poll first, so any option found in the index has a live entry.
        self.polls
            .write()
            .await
            .insert(poll_id, Arc::new(RwLock::new(entry)));
        let mut index = self.option_index.write().await;
        for (option_id, _) in &options {
            index.insert(*option_id, poll_id);
        }

        Ok(PollWithResults {
            poll,
            options: results,
        })
    }

    async fn get_poll(&self, poll_id: PollId) -> Result<Option<Poll>, StoreError> {
        match self.entry(poll_id).await {
            Some(entry) => Ok(Some(entry.read().await.poll.clone())),
            None => Ok(None),
        }
    }

    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let entries: Vec<_> = self.polls.read().await.values().map(Arc::clone).collect();
        let mut polls = Vec::with_capacity(entries.len());
        for entry in entries {
            polls.push(entry.read().await.poll.clone());
        }
        polls.sort_by_key(|p| p.id);
        Ok(polls)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn fruit_poll() -> NewPoll {
        NewPoll {
            question: "Best fruit".to_string(),
            is_published: true,
            creator_id: UserId::new(1),
            options: vec!["Apple".to_string(), "Banana".to_string()],
        }
    }

    async fn seeded() -> (InMemoryTallyStore, PollWithResults) {
        let store = InMemoryTallyStore::new();
        let Ok(created) = store.create_poll(fruit_poll()).await else {
            panic!("poll creation failed");
        };
        (store, created)
    }

    fn option_ids(created: &PollWithResults) -> (OptionId, OptionId) {
        let [apple, banana] = created.options.as_slice() else {
            panic!("expected two options");
        };
        (apple.id, banana.id)
    }

    #[tokio::test]
    async fn create_poll_starts_with_zero_counts() {
        let (_, created) = seeded().await;
        assert_eq!(created.options.len(), 2);
        assert!(created.options.iter().all(|o| o.votes == 0));
    }

    #[tokio::test]
    async fn find_option_resolves_owning_poll() {
        let (store, created) = seeded().await;
        let (apple, _) = option_ids(&created);

        let Ok(Some(option)) = store.find_poll_option(apple).await else {
            panic!("option not found");
        };
        assert_eq!(option.poll_id, created.poll.id);
        assert_eq!(option.text, "Apple");

        let missing = store.find_poll_option(OptionId::new(999)).await;
        assert!(matches!(missing, Ok(None)));
    }

    #[tokio::test]
    async fn second_vote_in_same_poll_is_duplicate() {
        let (store, created) = seeded().await;
        let (apple, banana) = option_ids(&created);
        let user = UserId::new(1);

        assert!(store.persist_vote(user, apple).await.is_ok());
        let second = store.persist_vote(user, banana).await;
        assert_eq!(second, Err(StoreError::DuplicateVote));

        let Ok(tally) = store.list_options_with_counts(created.poll.id).await else {
            panic!("tally failed");
        };
        let counts: Vec<i64> = tally.iter().map(|t| t.votes).collect();
        assert_eq!(counts, vec![1, 0]);
    }

    #[tokio::test]
    async fn vote_for_unknown_option_is_not_found() {
        let (store, _) = seeded().await;
        let result = store.persist_vote(UserId::new(1), OptionId::new(404)).await;
        assert_eq!(result, Err(StoreError::OptionNotFound(OptionId::new(404))));
    }

    #[tokio::test]
    async fn tally_keeps_creation_order() {
        let (store, created) = seeded().await;
        let (_, banana) = option_ids(&created);
        for user in 1..=3 {
            let _ = store.persist_vote(UserId::new(user), banana).await;
        }

        let Ok(tally) = store.list_options_with_counts(created.poll.id).await else {
            panic!("tally failed");
        };
        let texts: Vec<&str> = tally.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Apple", "Banana"]);
    }

    #[tokio::test]
    async fn same_user_may_vote_in_different_polls() {
        let store = InMemoryTallyStore::new();
        let Ok(first) = store.create_poll(fruit_poll()).await else {
            panic!("poll creation failed");
        };
        let Ok(second) = store.create_poll(fruit_poll()).await else {
            panic!("poll creation failed");
        };
        let (a, _) = option_ids(&first);
        let (b, _) = option_ids(&second);

        assert!(store.persist_vote(UserId::new(9), a).await.is_ok());
        assert!(store.persist_vote(UserId::new(9), b).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_votes_by_one_user_commit_once() {
        let (store, created) = seeded().await;
        let store = Arc::new(store);
        let (apple, banana) = option_ids(&created);

        let mut handles = Vec::new();
        for attempt in 0..32 {
            let store = Arc::clone(&store);
            let option = if attempt % 2 == 0 { apple } else { banana };
            handles.push(tokio::spawn(async move {
                store.persist_vote(UserId::new(7), option).await
            }));
        }

        let mut committed = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => committed += 1,
                Ok(Err(StoreError::DuplicateVote)) => duplicates += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(committed, 1);
        assert_eq!(duplicates, 31);
    }

    #[tokio::test]
    async fn unknown_poll_has_empty_tally() {
        let store = InMemoryTallyStore::new();
        let tally = store.list_options_with_counts(PollId::new(1)).await;
        assert!(matches!(tally, Ok(ref t) if t.is_empty()));
        assert!(matches!(store.get_poll(PollId::new(1)).await, Ok(None)));
    }

    #[tokio::test]
    async fn list_polls_is_ordered_by_id() {
        let store = InMemoryTallyStore::new();
        for _ in 0..3 {
            let _ = store.create_poll(fruit_poll()).await;
        }
        let Ok(polls) = store.list_polls().await else {
            panic!("list failed");
        };
        let ids: Vec<i64> = polls.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
