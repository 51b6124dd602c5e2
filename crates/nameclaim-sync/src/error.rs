//! Error types for the sync module.

use thiserror::Error;

/// Errors reported by a mesh adapter.
#[derive(Debug, Clone, Error)]
pub enum MeshError {
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// `open` or `accept` was called twice.
    #[error("adapter already opened")]
    AlreadyOpen,

    /// The adapter has been closed.
    #[error("adapter closed")]
    Closed,
}

/// Fatal negotiation errors.
///
/// Anything that goes wrong on a single peer stream is handled inside that
/// peer's session and never shows up here.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The mesh adapter reported an error.
    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),

    /// The mesh adapter stopped delivering events.
    #[error("mesh adapter closed its event channels")]
    MeshClosed,

    /// The claim timer fired with no candidate left and nothing claimed.
    #[error("all specified usernames are already claimed")]
    AllUsernamesClaimed,
}

/// Result type for negotiation operations.
pub type Result<T> = std::result::Result<T, NegotiationError>;
