//! # nameclaim testkit
//!
//! Testing utilities for nameclaim.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: in-memory nodes and scripted peers for protocol scenarios
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Drive a node from the remote side of a peer stream:
//!
//! ```rust,no_run
//! use nameclaim_core::Message;
//! use nameclaim_testkit::fixtures::{ScriptedPeer, TestNode};
//!
//! async fn example() {
//!     let mut node = TestNode::spawn(&["alice", "bob"], 100);
//!     node.assign_session("s-1").await;
//!
//!     let mut peer = ScriptedPeer::connect(&node).await;
//!     let greeting = peer.expect_greeting().await;
//!     assert!(greeting.ids.contains("alice"));
//!
//!     peer.send(&Message::kick("alice")).await.unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use nameclaim_testkit::generators::ContentionParams;
//!
//! proptest! {
//!     #[test]
//!     fn one_side_backs_off(params: ContentionParams) {
//!         let (older, newer) = params.pools();
//!         prop_assert!(!newer.outranks(&params.shared_greeting_ids(), older.timestamp()));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{link_all, spawn_nodes, ScriptedPeer, TestNode};
