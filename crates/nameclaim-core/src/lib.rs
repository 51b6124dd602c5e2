//! # nameclaim core
//!
//! Primitives shared by every nameclaim node: the three negotiation
//! messages and the codec that moves them over a peer stream.
//!
//! This crate knows nothing about candidate pools, timers or the mesh. It
//! turns [`Message`] values into JSON documents on an `AsyncWrite` and back
//! from an `AsyncRead`.
//!
//! ## Key Types
//!
//! - [`Message`] - `Greeting`, `Kick` or `Backoff`
//! - [`Decoded`] - result of interpreting one inbound document
//! - [`MessageEncoder`] / [`MessageDecoder`] - per-stream codec halves
//! - [`CodecError`] - stream-fatal codec failures

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{message_pair, MessageDecoder, MessageEncoder};
pub use error::{CodecError, Result};
pub use message::{kinds, limits, Decoded, Greeting, Kick, Message};
