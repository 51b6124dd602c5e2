//! The claim scheduler.
//!
//! A single loop per node owns the mesh adapter. It resets the candidate
//! pool whenever the transport assigns a new session identifier, decides on
//! a name when the claim timer fires, and spawns one [`PeerSession`] for
//! every peer stream the adapter accepts.

use std::sync::Arc;
use std::time::Duration;

use nameclaim_pool::{CandidatePool, LogicalClock, SystemClock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NegotiationError, Result};
use crate::session::{PeerSession, SessionContext, SessionReport};
use crate::timer::{expired, ClaimTimer};
use crate::transport::{MeshAdapter, SessionFeed};

/// Events buffered for slow subscribers.
const EVENT_CAPACITY: usize = 256;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Usernames to negotiate for, restored on every new session.
    pub usernames: Vec<String>,
    /// How long to wait after a new session before claiming.
    pub claim_window: Duration,
    /// Pause after a backoff, and the timer interval re-armed afterwards.
    pub backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            usernames: Vec::new(),
            claim_window: Duration::from_secs(15),
            backoff: Duration::from_secs(5),
        }
    }
}

/// Observable progress of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimEvent {
    /// The transport assigned a new session identifier.
    SessionAssigned(String),
    /// A username was claimed for the session.
    Claimed { session: String, name: String },
    /// A peer session ended.
    PeerFinished(SessionReport),
}

/// The coordinating loop of a node.
pub struct ClaimScheduler<A: MeshAdapter> {
    adapter: A,
    config: SchedulerConfig,
    pool: Arc<CandidatePool>,
    clock: Arc<dyn LogicalClock>,
    timer: ClaimTimer,
    events: broadcast::Sender<ClaimEvent>,
    session: Option<String>,
    next_peer: u64,
}

impl<A: MeshAdapter> ClaimScheduler<A> {
    /// Create a scheduler over `adapter`.
    pub fn new(adapter: A, config: SchedulerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            adapter,
            config,
            pool: Arc::new(CandidatePool::new()),
            clock: Arc::new(SystemClock),
            timer: ClaimTimer::new(),
            events,
            session: None,
            next_peer: 0,
        }
    }

    /// Use a specific candidate pool (e.g. one with a custom selection policy).
    pub fn with_pool(mut self, pool: Arc<CandidatePool>) -> Self {
        self.pool = pool;
        self
    }

    /// Use a specific source of session timestamps.
    pub fn with_clock(mut self, clock: impl LogicalClock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The pool this scheduler negotiates over.
    pub fn pool(&self) -> Arc<CandidatePool> {
        Arc::clone(&self.pool)
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClaimEvent> {
        self.events.subscribe()
    }

    /// Run until `cancel` fires or a fatal error occurs.
    ///
    /// Returns the name held at shutdown, if any. Peer sessions are cancelled
    /// and the adapter is closed on every exit path.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<Option<String>> {
        let mut feed = match self.adapter.open().await {
            Ok(feed) => feed,
            Err(e) => {
                self.close_adapter().await;
                return Err(e.into());
            }
        };
        let mut peers = match self.adapter.accept().await {
            Ok(peers) => peers,
            Err(e) => {
                self.close_adapter().await;
                return Err(e.into());
            }
        };

        let sessions = cancel.child_token();
        let outcome = self.event_loop(&cancel, &sessions, &mut feed, &mut peers).await;
        sessions.cancel();

        match (outcome, self.adapter.close().await) {
            (Ok(name), Ok(())) => Ok(name),
            (Ok(_), Err(close)) => Err(close.into()),
            (Err(e), Err(close)) => {
                warn!(error = %close, "failed to close mesh adapter");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    async fn event_loop(
        &mut self,
        cancel: &CancellationToken,
        sessions: &CancellationToken,
        feed: &mut SessionFeed,
        peers: &mut tokio::sync::mpsc::Receiver<A::Stream>,
    ) -> Result<Option<String>> {
        let mut deadlines = self.timer.subscribe();

        loop {
            let deadline = *deadlines.borrow_and_update();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("negotiation cancelled");
                    return Ok(self.pool.claimed_name());
                }

                error = feed.errors.recv() => {
                    return Err(error.map_or(NegotiationError::MeshClosed, NegotiationError::from));
                }

                id = feed.session_ids.recv() => {
                    let id = id.ok_or(NegotiationError::MeshClosed)?;
                    self.start_session(id);
                }

                // Re-read the deadline at the top of the loop.
                _ = deadlines.changed() => {}

                _ = expired(deadline) => {
                    if let Some(at) = deadline {
                        self.timer.disarm_if(at);
                    }
                    self.decide()?;
                }

                stream = peers.recv() => {
                    let stream = stream.ok_or(NegotiationError::MeshClosed)?;
                    self.spawn_session(stream, sessions);
                }
            }
        }
    }

    fn start_session(&mut self, id: String) {
        let timestamp = self.clock.now();
        self.pool.reset(self.config.usernames.iter().cloned(), timestamp);
        self.timer.arm(self.config.claim_window);

        info!(session = %id, timestamp, "session assigned");
        self.session = Some(id.clone());
        let _ = self.events.send(ClaimEvent::SessionAssigned(id));
    }

    fn decide(&mut self) -> Result<()> {
        let Some(session) = self.session.clone() else {
            debug!("claim timer fired before any session was assigned");
            return Ok(());
        };

        match self.pool.try_claim() {
            Some(name) => {
                info!(session = %session, name = %name, "username claimed");
                let _ = self.events.send(ClaimEvent::Claimed { session, name });
                Ok(())
            }
            None if self.pool.is_claimed() => {
                debug!("claim timer fired after claiming, nothing to do");
                Ok(())
            }
            None => Err(NegotiationError::AllUsernamesClaimed),
        }
    }

    fn spawn_session(&mut self, stream: A::Stream, sessions: &CancellationToken) {
        self.next_peer += 1;
        let peer = self.next_peer;
        debug!(peer, "peer connected");

        let ctx = SessionContext {
            pool: Arc::clone(&self.pool),
            timer: self.timer.clone(),
            backoff: self.config.backoff,
            cancel: sessions.clone(),
        };
        let events = self.events.clone();

        tokio::spawn(async move {
            let report = PeerSession::new(peer, stream, ctx).run().await;
            let _ = events.send(ClaimEvent::PeerFinished(report));
        });
    }

    async fn close_adapter(&mut self) {
        if let Err(e) = self.adapter.close().await {
            warn!(error = %e, "failed to close mesh adapter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;
    use crate::session::SessionEnd;
    use crate::transport::memory::{channel, MemoryMeshHandle};
    use nameclaim_core::{message_pair, Decoded, Message};
    use nameclaim_pool::{FixedClock, LexicographicSelection};
    use tokio::task::JoinHandle;

    fn config(names: &[&str]) -> SchedulerConfig {
        SchedulerConfig {
            usernames: names.iter().map(|s| s.to_string()).collect(),
            claim_window: Duration::from_secs(15),
            backoff: Duration::from_secs(5),
        }
    }

    struct Node {
        handle: MemoryMeshHandle,
        events: broadcast::Receiver<ClaimEvent>,
        pool: Arc<CandidatePool>,
        cancel: CancellationToken,
        task: JoinHandle<Result<Option<String>>>,
    }

    fn start(names: &[&str], timestamp: i64) -> Node {
        let (adapter, handle) = channel();
        let scheduler = ClaimScheduler::new(adapter, config(names))
            .with_pool(Arc::new(CandidatePool::with_policy(LexicographicSelection)))
            .with_clock(FixedClock(timestamp));
        let events = scheduler.subscribe();
        let pool = scheduler.pool();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(cancel.clone()));
        Node {
            handle,
            events,
            pool,
            cancel,
            task,
        }
    }

    async fn next_claim(events: &mut broadcast::Receiver<ClaimEvent>) -> String {
        loop {
            if let ClaimEvent::Claimed { name, .. } = events.recv().await.unwrap() {
                return name;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_claims_after_window_without_peers() {
        let mut node = start(&["alice", "bob"], 100);
        node.handle.assign_session("s-1").await.unwrap();

        assert_eq!(
            node.events.recv().await.unwrap(),
            ClaimEvent::SessionAssigned("s-1".into())
        );
        assert_eq!(next_claim(&mut node.events).await, "alice");
        assert!(node.pool.snapshot().candidates.is_empty());

        node.cancel.cancel();
        assert_eq!(node.task.await.unwrap().unwrap(), Some("alice".into()));
        assert!(node.handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_waits_for_full_window() {
        let mut node = start(&["alice"], 100);
        let start = tokio::time::Instant::now();
        node.handle.assign_session("s-1").await.unwrap();

        next_claim(&mut node.events).await;
        assert!(tokio::time::Instant::now() - start >= Duration::from_secs(15));
        node.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_resets_claim() {
        let mut node = start(&["alice", "bob"], 100);
        node.handle.assign_session("s-1").await.unwrap();
        assert_eq!(next_claim(&mut node.events).await, "alice");

        node.handle.assign_session("s-2").await.unwrap();
        loop {
            if node.events.recv().await.unwrap() == ClaimEvent::SessionAssigned("s-2".into()) {
                break;
            }
        }
        assert!(!node.pool.is_claimed());
        assert_eq!(node.pool.snapshot().candidates.len(), 2);

        assert_eq!(next_claim(&mut node.events).await, "alice");
        node.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_names_kicked_is_fatal() {
        let node = start(&["alice"], 100);
        node.handle.assign_session("s-1").await.unwrap();

        let remote = node.handle.connect_peer().await.unwrap();
        let (mut decoder, mut encoder) = message_pair(remote);
        decoder.decode().await.unwrap();
        encoder.encode(&Message::kick("alice")).await.unwrap();

        let result = node.task.await.unwrap();
        assert!(matches!(result, Err(NegotiationError::AllUsernamesClaimed)));
        assert!(node.handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_error_is_fatal() {
        let node = start(&["alice"], 100);
        node.handle
            .fail(MeshError::Transport("relay unreachable".into()))
            .await
            .unwrap();

        let result = node.task.await.unwrap();
        assert!(matches!(
            result,
            Err(NegotiationError::Mesh(MeshError::Transport(_)))
        ));
        assert!(node.handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_transport_is_fatal() {
        let node = start(&["alice"], 100);
        drop(node.handle);

        let result = node.task.await.unwrap();
        assert!(matches!(result, Err(NegotiationError::MeshClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_before_session_is_ignored() {
        let node = start(&["alice"], 100);

        // A stray backoff arms the timer before any session exists.
        let remote = node.handle.connect_peer().await.unwrap();
        let (mut decoder, mut encoder) = message_pair(remote);
        decoder.decode().await.unwrap();
        encoder.encode(&Message::Backoff).await.unwrap();
        decoder.decode().await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!node.task.is_finished());
        node.cancel.cancel();
        assert_eq!(node.task.await.unwrap().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_ends_peer_sessions() {
        let mut node = start(&["alice"], 100);
        node.handle.assign_session("s-1").await.unwrap();

        let remote = node.handle.connect_peer().await.unwrap();
        let (mut decoder, _encoder) = message_pair(remote);
        decoder.decode().await.unwrap();

        node.cancel.cancel();
        node.task.await.unwrap().unwrap();

        loop {
            if let ClaimEvent::PeerFinished(report) = node.events.recv().await.unwrap() {
                assert_eq!(report.end, SessionEnd::Cancelled);
                break;
            }
        }
        assert!(decoder.decode().await.unwrap_err().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_claim() {
        let mut node = start(&["alice"], 200);
        let start = tokio::time::Instant::now();
        node.handle.assign_session("s-1").await.unwrap();

        let remote = node.handle.connect_peer().await.unwrap();
        let (mut decoder, mut encoder) = message_pair(remote);
        assert_eq!(
            decoder.decode().await.unwrap(),
            Decoded::Message(Message::greeting(["alice"], 200))
        );

        // Just before the window closes, a higher-priority peer pushes back.
        tokio::time::sleep(Duration::from_secs(14)).await;
        encoder.encode(&Message::Backoff).await.unwrap();

        assert_eq!(next_claim(&mut node.events).await, "alice");
        // 14s, then a 5s pause, then the re-armed 5s window.
        assert!(tokio::time::Instant::now() - start >= Duration::from_secs(24));
        node.cancel.cancel();
    }
}
