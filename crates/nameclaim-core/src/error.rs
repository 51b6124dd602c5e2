//! Error types for the nameclaim core.

use thiserror::Error;

/// Errors raised while moving negotiation messages over a peer stream.
///
/// Every variant is fatal for the stream it occurred on, and only for that
/// stream. Documents that parse as JSON but cannot be interpreted as a
/// message are not errors; see [`crate::Decoded`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("malformed document: {0}")]
    Syntax(String),

    #[error("stream ended in the middle of a document")]
    UnexpectedEof,

    #[error("stream closed")]
    Closed,

    #[error("document exceeds {limit} bytes")]
    DocumentTooLarge { limit: usize },
}

impl CodecError {
    /// Whether the peer simply went away between documents.
    pub fn is_closed(&self) -> bool {
        matches!(self, CodecError::Closed)
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
