//! Fan-out of fresh tallies after an admitted vote.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::domain::{OptionTally, PollEvent, PollId, PublishReport, TopicHub, tallies_dominate};
use crate::store::TallyStore;

/// Last snapshot broadcast for one poll.
#[derive(Debug, Default)]
struct PublishGate {
    last_published: Vec<OptionTally>,
}

/// Pushes vote updates to poll subscribers through the [`TopicHub`].
///
/// Broadcasts for one poll pass through that poll's gate one at a time.
/// Inside the gate the tally is re-read from committed state, so whichever
/// broadcast goes last carries the newest counts; a snapshot lower than the
/// last one sent is dropped. Different polls never share a gate.
#[derive(Debug)]
pub struct ResultPublisher {
    store: Arc<dyn TallyStore>,
    hub: Arc<TopicHub>,
    storage_timeout: Duration,
    gates: RwLock<HashMap<PollId, Arc<Mutex<PublishGate>>>>,
}

impl ResultPublisher {
    /// Creates a new `ResultPublisher`.
    #[must_use]
    pub fn new(store: Arc<dyn TallyStore>, hub: Arc<TopicHub>, storage_timeout: Duration) -> Self {
        Self {
            store,
            hub,
            storage_timeout,
            gates: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the hub this publisher broadcasts through.
    #[must_use]
    pub fn hub(&self) -> &Arc<TopicHub> {
        &self.hub
    }

    /// Broadcasts the current tally of `poll_id` to its subscribers.
    ///
    /// `results` are the tallies computed at admission; they are used only
    /// if re-reading committed state fails. When both are unavailable
    /// nothing is sent. Never retries and never fails:
    /// per-listener problems are reported in the returned
    /// [`PublishReport`].
    pub async fn on_vote_admitted(
        &self,
        poll_id: PollId,
        results: Vec<OptionTally>,
    ) -> PublishReport {
        if self.hub.subscriber_count(poll_id).await == 0 {
            return PublishReport::default();
        }

        let gate = self.gate(poll_id).await;
        let mut gate = gate.lock().await;

        let snapshot = match tokio::time::timeout(
            self.storage_timeout,
            self.store.list_options_with_counts(poll_id),
        )
        .await
        {
            Ok(Ok(fresh)) if !fresh.is_empty() => fresh,
            Ok(Ok(_)) => results,
            Ok(Err(e)) => {
                tracing::warn!(%poll_id, error = %e, "tally refresh failed, using admission tally");
                results
            }
            Err(_) => {
                tracing::warn!(%poll_id, "tally refresh timed out, using admission tally");
                results
            }
        };

        if snapshot.is_empty() {
            tracing::warn!(%poll_id, "no tally available, update not broadcast");
            return PublishReport::default();
        }
        if !tallies_dominate(&snapshot, &gate.last_published) {
            tracing::debug!(%poll_id, "snapshot older than last broadcast, skipped");
            return PublishReport::default();
        }

        let report = self
            .hub
            .publish(poll_id, PollEvent::vote_update(poll_id, snapshot.clone()))
            .await;
        gate.last_published = snapshot;

        if report.lagged > 0 || report.disconnected > 0 {
            tracing::warn!(
                %poll_id,
                delivered = report.delivered,
                lagged = report.lagged,
                disconnected = report.disconnected,
                "vote update partially delivered"
            );
        } else {
            tracing::debug!(%poll_id, delivered = report.delivered, "vote update broadcast");
        }
        report
    }

    async fn gate(&self, poll_id: PollId) -> Arc<Mutex<PublishGate>> {
        if let Some(gate) = self.gates.read().await.get(&poll_id) {
            return Arc::clone(gate);
        }
        let mut gates = self.gates.write().await;
        Arc::clone(gates.entry(poll_id).or_default())
    }
}
