//! # nameclaim sync
//!
//! Leaderless username negotiation between directly connected peers.
//!
//! ## Overview
//!
//! Every node offers the same candidate list to every peer it is connected
//! to. Contention over a name is settled pairwise by the logical timestamp
//! each node captured when its current session started: the lower
//! timestamp keeps the name and tells the other side to back off. Once a
//! node has claimed a name it kicks any peer still offering it.
//!
//! ## Key Properties
//!
//! - **No coordinator**: each node decides locally when its claim timer fires
//! - **Isolated failures**: a broken peer stream ends only that peer's session
//! - **Restartable**: a new session identifier resets the pool and the timer
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nameclaim_sync::{ClaimScheduler, SchedulerConfig};
//! use nameclaim_sync::transport::memory;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() {
//!     let (adapter, mesh) = memory::channel();
//!     let config = SchedulerConfig {
//!         usernames: vec!["alice".into(), "bob".into()],
//!         ..Default::default()
//!     };
//!
//!     let scheduler = ClaimScheduler::new(adapter, config);
//!     let mut events = scheduler.subscribe();
//!     let cancel = CancellationToken::new();
//!     let run = tokio::spawn(scheduler.run(cancel.clone()));
//!
//!     mesh.assign_session("session-1").await.unwrap();
//!     // events yields SessionAssigned, then Claimed once the window closes
//!     let _ = events.recv().await;
//!
//!     cancel.cancel();
//!     let _ = run.await;
//! }
//! ```

pub mod error;
pub mod scheduler;
pub mod session;
pub mod timer;
pub mod transport;

pub use error::{MeshError, NegotiationError, Result};
pub use scheduler::{ClaimEvent, ClaimScheduler, SchedulerConfig};
pub use session::{PeerSession, SessionContext, SessionEnd, SessionReport};
pub use timer::ClaimTimer;
pub use transport::{
    memory::{MemoryAdapter, MemoryMeshHandle},
    MeshAdapter, PeerStream, SessionFeed,
};
