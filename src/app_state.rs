//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::TopicHub;
use crate::service::{PollService, ResultPublisher, VoteService};
use crate::store::TallyStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Vote admission and broadcast.
    pub vote_service: Arc<VoteService>,
    /// Poll record management.
    pub poll_service: Arc<PollService>,
    /// Topic hub for WebSocket subscriptions.
    pub hub: Arc<TopicHub>,
}

impl AppState {
    /// Wires the hub, publisher and services over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TallyStore>, config: &GatewayConfig) -> Self {
        let hub = Arc::new(TopicHub::new(config.listener_buffer));
        let publisher = Arc::new(ResultPublisher::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            config.storage_timeout,
        ));
        let vote_service = Arc::new(VoteService::new(
            Arc::clone(&store),
            publisher,
            config.storage_timeout,
        ));
        let poll_service = Arc::new(PollService::new(store));
        Self {
            vote_service,
            poll_service,
            hub,
        }
    }
}
