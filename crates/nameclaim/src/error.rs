//! Error types for nameclaim.

use nameclaim_sync::NegotiationError;
use thiserror::Error;

/// Configuration problems detected before negotiation starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing community")]
    MissingCommunity,

    #[error("missing password")]
    MissingPassword,

    #[error("missing key")]
    MissingKey,

    #[error("missing usernames")]
    MissingUsernames,

    #[error("invalid remote address: {0}")]
    InvalidRemoteAddress(String),
}

/// Errors that can occur while running a negotiator.
#[derive(Debug, Error)]
pub enum NameclaimError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fatal negotiation failure.
    #[error("negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),
}

/// Result type for nameclaim operations.
pub type Result<T> = std::result::Result<T, NameclaimError>;
