//! Per-poll topic registry and fan-out.
//!
//! [`TopicHub`] owns the mapping from poll topics to subscribed listeners.
//! Each listener (one WebSocket connection) registers once via
//! [`TopicHub::connect`] and receives its own bounded
//! [`tokio::sync::mpsc`] queue; publishing a [`PollEvent`] pushes one shared
//! `Arc` into the queue of every listener subscribed to that poll.
//!
//! # Locking
//!
//! - `listeners` guards membership bookkeeping and is only taken by
//!   subscribe/unsubscribe/disconnect. Publishing never touches it.
//! - `topics` maps poll ids to per-topic subscriber sets. Publishing holds
//!   its read lock only long enough to clone the topic handle.
//! - Each topic has its own mutex. Publishes to the same poll are
//!   serialized on it, which keeps per-listener delivery in publish order.
//!
//! Lock order is always `listeners` → `topics` → topic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};

use super::{ListenerId, PollEvent, PollId};

/// Receiving side of a registered listener.
///
/// Dropping the `Listener` closes its queue; the hub prunes closed queues on
/// the next publish, but callers should still call
/// [`TopicHub::unsubscribe_all`] on disconnect.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    receiver: mpsc::Receiver<Arc<PollEvent>>,
}

impl Listener {
    /// Returns the identifier used for subscribe/unsubscribe calls.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Waits for the next event. Returns `None` once the hub has dropped
    /// this listener's queue.
    pub async fn recv(&mut self) -> Option<Arc<PollEvent>> {
        self.receiver.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<PollEvent>> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome of a single [`TopicHub::publish`] call.
///
/// Per-listener failures are counted here and logged; they never abort
/// delivery to the remaining listeners.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Listeners whose queue accepted the event.
    pub delivered: usize,
    /// Listeners whose queue was full; they skip this snapshot.
    pub lagged: usize,
    /// Listeners whose queue was closed; they were removed from the topic.
    pub disconnected: usize,
}

#[derive(Debug)]
struct Membership {
    sender: mpsc::Sender<Arc<PollEvent>>,
    polls: HashSet<PollId>,
}

#[derive(Debug, Default)]
struct Topic {
    subscribers: HashMap<ListenerId, mpsc::Sender<Arc<PollEvent>>>,
}

/// Registry of poll topics and their subscribed listeners.
#[derive(Debug)]
pub struct TopicHub {
    listener_capacity: usize,
    listeners: RwLock<HashMap<ListenerId, Membership>>,
    topics: RwLock<HashMap<PollId, Arc<Mutex<Topic>>>>,
}

impl TopicHub {
    /// Creates an empty hub. Every listener queue holds up to
    /// `listener_capacity` undelivered events.
    #[must_use]
    pub fn new(listener_capacity: usize) -> Self {
        Self {
            listener_capacity: listener_capacity.max(1),
            listeners: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new listener with no subscriptions.
    pub async fn connect(&self) -> Listener {
        let id = ListenerId::new();
        let (sender, receiver) = mpsc::channel(self.listener_capacity);
        self.listeners.write().await.insert(
            id,
            Membership {
                sender,
                polls: HashSet::new(),
            },
        );
        tracing::debug!(listener = %id, "listener connected");
        Listener { id, receiver }
    }

    /// Subscribes `listener` to `poll_id`.
    ///
    /// Idempotent: returns `true` only when the subscription is new.
    /// Subscribing an unknown (already disconnected) listener is a no-op.
    pub async fn subscribe(&self, listener: ListenerId, poll_id: PollId) -> bool {
        let mut listeners = self.listeners.write().await;
        let Some(membership) = listeners.get_mut(&listener) else {
            tracing::debug!(%listener, %poll_id, "subscribe from unknown listener ignored");
            return false;
        };
        if !membership.polls.insert(poll_id) {
            return false;
        }

        let topic = {
            let mut topics = self.topics.write().await;
            Arc::clone(topics.entry(poll_id).or_default())
        };
        topic
            .lock()
            .await
            .subscribers
            .insert(listener, membership.sender.clone());

        tracing::debug!(%listener, %poll_id, "listener subscribed");
        true
    }

    /// Unsubscribes `listener` from `poll_id`.
    ///
    /// Returns `true` if a subscription was removed. Leaving a poll that was
    /// never joined is a no-op.
    pub async fn unsubscribe(&self, listener: ListenerId, poll_id: PollId) -> bool {
        let mut listeners = self.listeners.write().await;
        let removed = listeners
            .get_mut(&listener)
            .is_some_and(|membership| membership.polls.remove(&poll_id));
        if removed {
            self.detach(listener, poll_id).await;
            tracing::debug!(%listener, %poll_id, "listener unsubscribed");
        }
        removed
    }

    /// Removes `listener` from every topic and forgets it.
    ///
    /// Called on disconnect. Safe to race with [`Self::publish`]: an event
    /// is either queued whole before removal or not queued at all. Returns
    /// the number of subscriptions dropped.
    pub async fn unsubscribe_all(&self, listener: ListenerId) -> usize {
        let mut listeners = self.listeners.write().await;
        let Some(membership) = listeners.remove(&listener) else {
            return 0;
        };
        for poll_id in &membership.polls {
            self.detach(listener, *poll_id).await;
        }
        tracing::debug!(%listener, dropped = membership.polls.len(), "listener disconnected");
        membership.polls.len()
    }

    /// Delivers `event` to every listener subscribed to `poll_id` right now.
    ///
    /// Listeners that subscribe afterwards do not see it. A full queue skips
    /// the event for that listener only; a closed queue is pruned.
    pub async fn publish(&self, poll_id: PollId, event: PollEvent) -> PublishReport {
        let topic = {
            let topics = self.topics.read().await;
            topics.get(&poll_id).map(Arc::clone)
        };
        let Some(topic) = topic else {
            return PublishReport::default();
        };

        let event = Arc::new(event);
        let mut report = PublishReport::default();
        let mut topic = topic.lock().await;
        topic.subscribers.retain(|listener, sender| {
            match sender.try_send(Arc::clone(&event)) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(%listener, %poll_id, "listener queue full, update skipped");
                    report.lagged += 1;
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%listener, %poll_id, "listener gone during publish");
                    report.disconnected += 1;
                    false
                }
            }
        });
        report
    }

    /// Returns the number of listeners currently subscribed to `poll_id`.
    pub async fn subscriber_count(&self, poll_id: PollId) -> usize {
        let topic = {
            let topics = self.topics.read().await;
            topics.get(&poll_id).map(Arc::clone)
        };
        match topic {
            Some(topic) => topic.lock().await.subscribers.len(),
            None => 0,
        }
    }

    /// Returns the number of connected listeners.
    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Removes `listener` from one topic, dropping the topic once empty.
    /// Caller must hold the `listeners` write lock.
    async fn detach(&self, listener: ListenerId, poll_id: PollId) {
        let mut topics = self.topics.write().await;
        let Some(topic) = topics.get(&poll_id).map(Arc::clone) else {
            return;
        };
        let mut guard = topic.lock().await;
        guard.subscribers.remove(&listener);
        if guard.subscribers.is_empty() {
            topics.remove(&poll_id);
        }
    }
}
