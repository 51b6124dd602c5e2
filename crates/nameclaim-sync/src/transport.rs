//! Mesh adapter abstraction.
//!
//! The mesh adapter discovers peers, negotiates connectivity and rotates the
//! local session identity. Negotiation only consumes what it produces: a
//! feed of session identifiers, a feed of fatal errors and a feed of
//! already-established duplex streams, one per connected peer.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::error::MeshError;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, MeshError>;

/// A duplex byte stream to one peer.
pub trait PeerStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> PeerStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Session identifiers and fatal errors delivered by an opened adapter.
///
/// Both channels must stay open for as long as the adapter is usable; a
/// closed channel is read as the adapter going away.
#[derive(Debug)]
pub struct SessionFeed {
    /// A new identifier every time the transport (re)assigns one.
    pub session_ids: mpsc::Receiver<String>,
    /// Fatal transport errors.
    pub errors: mpsc::Receiver<MeshError>,
}

/// The contract negotiation expects from the peer mesh.
///
/// Implementations must be Send so the scheduler can run on any runtime
/// thread.
#[async_trait]
pub trait MeshAdapter: Send {
    /// The per-peer stream type.
    type Stream: PeerStream;

    /// Connect to the mesh and start delivering session identifiers.
    async fn open(&mut self) -> Result<SessionFeed>;

    /// Start delivering streams of newly connected peers.
    async fn accept(&mut self) -> Result<mpsc::Receiver<Self::Stream>>;

    /// Tear down all transport resources.
    async fn close(&mut self) -> Result<()>;
}

/// An in-memory mesh for tests and local simulation.
///
/// Every [`MemoryAdapter`] comes with a [`MemoryMeshHandle`] that plays the
/// transport's role: it assigns session identifiers, injects errors and
/// hands out peer streams backed by [`tokio::io::duplex`].
pub mod memory {
    use super::*;
    use tokio::io::{duplex, DuplexStream};
    use tokio_util::sync::CancellationToken;

    /// Buffered events per channel.
    const CHANNEL_CAPACITY: usize = 64;

    /// Bytes buffered in each direction of a peer stream.
    const STREAM_BUFFER: usize = 64 * 1024;

    /// In-memory adapter implementation.
    pub struct MemoryAdapter {
        feed: Option<SessionFeed>,
        peers: Option<mpsc::Receiver<DuplexStream>>,
        closed: CancellationToken,
    }

    /// Transport-side controls of a [`MemoryAdapter`].
    #[derive(Clone)]
    pub struct MemoryMeshHandle {
        session_ids: mpsc::Sender<String>,
        errors: mpsc::Sender<MeshError>,
        peers: mpsc::Sender<DuplexStream>,
        closed: CancellationToken,
    }

    /// Create an adapter and its handle.
    pub fn channel() -> (MemoryAdapter, MemoryMeshHandle) {
        let (ids_tx, ids_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (peers_tx, peers_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let closed = CancellationToken::new();

        let adapter = MemoryAdapter {
            feed: Some(SessionFeed {
                session_ids: ids_rx,
                errors: errors_rx,
            }),
            peers: Some(peers_rx),
            closed: closed.clone(),
        };
        let handle = MemoryMeshHandle {
            session_ids: ids_tx,
            errors: errors_tx,
            peers: peers_tx,
            closed,
        };
        (adapter, handle)
    }

    /// Connect two adapters to each other with a fresh stream pair.
    pub async fn link(a: &MemoryMeshHandle, b: &MemoryMeshHandle) -> Result<()> {
        let (left, right) = duplex(STREAM_BUFFER);
        a.deliver(left).await?;
        b.deliver(right).await
    }

    impl MemoryMeshHandle {
        /// Assign a new session identifier to the adapter.
        pub async fn assign_session(&self, id: impl Into<String>) -> Result<()> {
            self.session_ids
                .send(id.into())
                .await
                .map_err(|_| MeshError::Closed)
        }

        /// Report a fatal transport error.
        pub async fn fail(&self, error: MeshError) -> Result<()> {
            self.errors.send(error).await.map_err(|_| MeshError::Closed)
        }

        /// Connect a new peer and return the remote end of its stream.
        pub async fn connect_peer(&self) -> Result<DuplexStream> {
            let (local, remote) = duplex(STREAM_BUFFER);
            self.deliver(local).await?;
            Ok(remote)
        }

        async fn deliver(&self, stream: DuplexStream) -> Result<()> {
            self.peers.send(stream).await.map_err(|_| MeshError::Closed)
        }

        /// Whether the adapter has been closed.
        pub fn is_closed(&self) -> bool {
            self.closed.is_cancelled()
        }

        /// Wait until the adapter is closed.
        pub async fn closed(&self) {
            self.closed.cancelled().await
        }
    }

    #[async_trait]
    impl MeshAdapter for MemoryAdapter {
        type Stream = DuplexStream;

        async fn open(&mut self) -> Result<SessionFeed> {
            if self.closed.is_cancelled() {
                return Err(MeshError::Closed);
            }
            self.feed.take().ok_or(MeshError::AlreadyOpen)
        }

        async fn accept(&mut self) -> Result<mpsc::Receiver<DuplexStream>> {
            if self.closed.is_cancelled() {
                return Err(MeshError::Closed);
            }
            self.peers.take().ok_or(MeshError::AlreadyOpen)
        }

        async fn close(&mut self) -> Result<()> {
            self.feed = None;
            self.peers = None;
            self.closed.cancel();
            Ok(())
        }
    }
}
