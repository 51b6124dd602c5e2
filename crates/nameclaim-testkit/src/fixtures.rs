//! Test fixtures and helpers.
//!
//! Common setup code for protocol scenarios: scheduler nodes running over
//! the in-memory mesh, and scripted peers that speak the wire protocol by
//! hand.

use std::sync::Arc;
use std::time::Duration;

use nameclaim_core::{
    message_pair, CodecError, Decoded, Greeting, Message, MessageDecoder, MessageEncoder,
};
use nameclaim_pool::{CandidatePool, FixedClock, LexicographicSelection};
use nameclaim_sync::transport::memory::{self, MemoryMeshHandle};
use nameclaim_sync::{ClaimEvent, ClaimScheduler, NegotiationError, SchedulerConfig, SessionReport};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Claim window used by fixtures.
pub const CLAIM_WINDOW: Duration = Duration::from_secs(15);

/// Backoff interval used by fixtures.
pub const BACKOFF: Duration = Duration::from_secs(5);

/// Scheduler config for `usernames` with the fixture timings.
pub fn scheduler_config(usernames: &[&str]) -> SchedulerConfig {
    SchedulerConfig {
        usernames: usernames.iter().map(|name| name.to_string()).collect(),
        claim_window: CLAIM_WINDOW,
        backoff: BACKOFF,
    }
}

/// A scheduler running on the in-memory mesh with a fixed timestamp and
/// lexicographic selection.
pub struct TestNode {
    pub mesh: MemoryMeshHandle,
    pub events: broadcast::Receiver<ClaimEvent>,
    pub pool: Arc<CandidatePool>,
    pub cancel: CancellationToken,
    task: JoinHandle<Result<Option<String>, NegotiationError>>,
}

impl TestNode {
    /// Spawn a node negotiating for `usernames` with the fixture timings.
    pub fn spawn(usernames: &[&str], timestamp: i64) -> Self {
        Self::spawn_with(scheduler_config(usernames), timestamp)
    }

    /// Spawn a node with a custom scheduler config.
    pub fn spawn_with(config: SchedulerConfig, timestamp: i64) -> Self {
        let (adapter, mesh) = memory::channel();
        let scheduler = ClaimScheduler::new(adapter, config)
            .with_pool(Arc::new(CandidatePool::with_policy(LexicographicSelection)))
            .with_clock(FixedClock(timestamp));

        let events = scheduler.subscribe();
        let pool = scheduler.pool();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(cancel.clone()));

        Self {
            mesh,
            events,
            pool,
            cancel,
            task,
        }
    }

    /// Assign a session id and wait until the node has reset its pool.
    pub async fn assign_session(&mut self, id: &str) {
        self.mesh
            .assign_session(id)
            .await
            .expect("node stopped before session assignment");
        loop {
            if let ClaimEvent::SessionAssigned(assigned) = self.next_event().await {
                if assigned == id {
                    return;
                }
            }
        }
    }

    /// The next progress event, skipping over lag.
    pub async fn next_event(&mut self) -> ClaimEvent {
        loop {
            match self.events.recv().await {
                Ok(event) => return event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("node event stream closed"),
            }
        }
    }

    /// Wait for the next claim.
    pub async fn wait_claimed(&mut self) -> String {
        loop {
            if let ClaimEvent::Claimed { name, .. } = self.next_event().await {
                return name;
            }
        }
    }

    /// Wait for the next finished peer session.
    pub async fn wait_report(&mut self) -> SessionReport {
        loop {
            if let ClaimEvent::PeerFinished(report) = self.next_event().await {
                return report;
            }
        }
    }

    /// Cancel the node and wait for its outcome.
    pub async fn shutdown(self) -> Result<Option<String>, NegotiationError> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the node to stop on its own.
    pub async fn join(self) -> Result<Option<String>, NegotiationError> {
        self.task.await.expect("negotiation task panicked")
    }
}

/// Spawn `count` nodes for `usernames` with timestamps 100, 200, ...
pub fn spawn_nodes(usernames: &[&str], count: usize) -> Vec<TestNode> {
    (0..count)
        .map(|i| TestNode::spawn(usernames, 100 * (i as i64 + 1)))
        .collect()
}

/// Connect every pair of nodes.
pub async fn link_all(nodes: &[TestNode]) {
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            memory::link(&a.mesh, &b.mesh)
                .await
                .expect("node stopped before linking");
        }
    }
}

/// A hand-driven peer on the remote end of a node's stream.
pub struct ScriptedPeer {
    decoder: MessageDecoder<ReadHalf<DuplexStream>>,
    encoder: MessageEncoder<WriteHalf<DuplexStream>>,
}

impl ScriptedPeer {
    /// Wrap the remote end of a peer stream.
    pub fn new(stream: DuplexStream) -> Self {
        let (decoder, encoder) = message_pair(stream);
        Self { decoder, encoder }
    }

    /// Connect a new peer to `node`.
    pub async fn connect(node: &TestNode) -> Self {
        let stream = node
            .mesh
            .connect_peer()
            .await
            .expect("node stopped before peer connected");
        Self::new(stream)
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), CodecError> {
        self.encoder.encode(message).await
    }

    /// Write raw bytes, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let writer = self.encoder.get_mut();
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Send a greeting for `ids` at `timestamp`.
    pub async fn greet(&mut self, ids: &[&str], timestamp: i64) -> Result<(), CodecError> {
        self.send(&Message::greeting(ids.iter().copied(), timestamp))
            .await
    }

    pub async fn recv(&mut self) -> Result<Decoded, CodecError> {
        self.decoder.decode().await
    }

    /// Receive the next well-formed message.
    pub async fn expect_message(&mut self) -> Message {
        match self.recv().await {
            Ok(Decoded::Message(message)) => message,
            other => panic!("expected a message, got {other:?}"),
        }
    }

    pub async fn expect_greeting(&mut self) -> Greeting {
        match self.expect_message().await {
            Message::Greeting(greeting) => greeting,
            other => panic!("expected a greeting, got {other:?}"),
        }
    }

    /// Receive a kick and return the kicked name.
    pub async fn expect_kick(&mut self) -> String {
        match self.expect_message().await {
            Message::Kick(kick) => kick.id,
            other => panic!("expected a kick, got {other:?}"),
        }
    }

    pub async fn expect_backoff(&mut self) {
        match self.expect_message().await {
            Message::Backoff => {}
            other => panic!("expected a backoff, got {other:?}"),
        }
    }

    /// Wait for the node to end the session.
    pub async fn expect_closed(&mut self) {
        match self.recv().await {
            Err(e) if e.is_closed() => {}
            other => panic!("expected the stream to close, got {other:?}"),
        }
    }

    /// Close our side of the stream.
    pub async fn close(mut self) {
        let _ = self.encoder.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nameclaim_sync::SessionEnd;

    #[tokio::test(start_paused = true)]
    async fn test_node_claims_alone() {
        let mut node = TestNode::spawn(&["bob", "alice"], 100);
        node.assign_session("s-1").await;

        assert_eq!(node.wait_claimed().await, "alice");
        assert_eq!(node.shutdown().await.unwrap(), Some("alice".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_peer_sees_greeting() {
        let mut node = TestNode::spawn(&["alice", "bob"], 100);
        node.assign_session("s-1").await;

        let mut peer = ScriptedPeer::connect(&node).await;
        let greeting = peer.expect_greeting().await;
        assert_eq!(greeting.timestamp, 100);
        assert_eq!(greeting.ids.len(), 2);

        peer.close().await;
        assert_eq!(node.wait_report().await.end, SessionEnd::PeerClosed);
        node.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_nodes_have_ordered_timestamps() {
        let mut nodes = spawn_nodes(&["alice"], 3);
        for (i, node) in nodes.iter_mut().enumerate() {
            node.assign_session(&format!("s-{i}")).await;
        }

        let timestamps: Vec<i64> = nodes.iter().map(|n| n.pool.timestamp()).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);

        for node in nodes {
            node.shutdown().await.unwrap();
        }
    }
}
