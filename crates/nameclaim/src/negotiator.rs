//! The negotiator: one node's entry point into the claim protocol.
//!
//! Wraps a [`ClaimScheduler`] with validated configuration so callers only
//! deal with a mesh adapter, a cancellation token and the outcome.

use std::sync::Arc;

use nameclaim_pool::{CandidatePool, LogicalClock};
use nameclaim_sync::{ClaimEvent, ClaimScheduler, MeshAdapter};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::NegotiatorConfig;
use crate::error::Result;

/// Negotiates a username for one node.
pub struct Negotiator<A: MeshAdapter> {
    config: NegotiatorConfig,
    scheduler: ClaimScheduler<A>,
}

impl<A: MeshAdapter> Negotiator<A> {
    /// Validate `config` and bind it to `adapter`.
    pub fn new(config: NegotiatorConfig, adapter: A) -> Result<Self> {
        config.validate()?;
        let scheduler = ClaimScheduler::new(adapter, config.scheduler_config());
        Ok(Self { config, scheduler })
    }

    /// Use a custom candidate pool, e.g. one with a deterministic selection
    /// policy.
    pub fn with_pool(mut self, pool: Arc<CandidatePool>) -> Self {
        self.scheduler = self.scheduler.with_pool(pool);
        self
    }

    /// Use a custom timestamp source.
    pub fn with_clock(mut self, clock: impl LogicalClock + 'static) -> Self {
        self.scheduler = self.scheduler.with_clock(clock);
        self
    }

    pub fn config(&self) -> &NegotiatorConfig {
        &self.config
    }

    /// The node's candidate pool.
    pub fn pool(&self) -> Arc<CandidatePool> {
        self.scheduler.pool()
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClaimEvent> {
        self.scheduler.subscribe()
    }

    /// Negotiate until `cancel` fires or negotiation fails.
    ///
    /// Returns the claimed username, or `None` if shutdown came first.
    pub async fn run(self, cancel: CancellationToken) -> Result<Option<String>> {
        info!(
            community = %self.config.community,
            usernames = self.config.usernames.len(),
            "starting username negotiation"
        );
        let claimed = self.scheduler.run(cancel).await?;
        Ok(claimed)
    }
}
