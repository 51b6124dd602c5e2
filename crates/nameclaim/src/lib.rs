//! # nameclaim
//!
//! Leaderless username negotiation for peers sharing an ephemeral mesh.
//!
//! ## Overview
//!
//! Nodes join a community through a [`MeshAdapter`](sync::MeshAdapter),
//! exchange their candidate usernames with every directly connected peer,
//! and claim one once the claim window closes:
//!
//! - **Greeting**: a node's remaining candidates plus its session timestamp
//! - **Backoff**: sent by the older node when both still want a name
//! - **Kick**: sent by a node that already holds a name its peer offers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nameclaim::{Negotiator, NegotiatorConfig};
//! use nameclaim::sync::transport::memory;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() -> nameclaim::Result<()> {
//!     nameclaim::logging::init(false);
//!
//!     let config = NegotiatorConfig::new("my-community", "secret", "key", "alice,bob");
//!     let (adapter, _mesh) = memory::channel();
//!
//!     let negotiator = Negotiator::new(config, adapter)?;
//!     if let Some(name) = negotiator.run(CancellationToken::new()).await? {
//!         println!("{name}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `nameclaim::core` - Messages and the wire codec
//! - `nameclaim::pool` - Candidate pool, selection and clocks
//! - `nameclaim::sync` - Peer sessions, the claim scheduler and transports

pub mod config;
pub mod error;
pub mod logging;
pub mod negotiator;

pub use config::{split_list, MeshSettings, NegotiatorConfig};
pub use error::{ConfigError, NameclaimError, Result};
pub use negotiator::Negotiator;

pub use nameclaim_sync::{ClaimEvent, SessionEnd, SessionReport};

pub use nameclaim_core as core;
pub use nameclaim_pool as pool;
pub use nameclaim_sync as sync;
