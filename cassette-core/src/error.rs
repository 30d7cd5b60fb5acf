//! Error types for cassette operations

use crate::proxy::{CapturedFailure, Fault, OperationKey};

/// Result type for cassette operations
pub type Result<T> = std::result::Result<T, CassetteError>;

/// Error types for the caching proxy
#[derive(Debug, thiserror::Error)]
pub enum CassetteError {
    /// Replay-only mode was asked for an operation that was never recorded
    #[error("{subject} has no cached response for {key}")]
    NotCached {
        /// Description of the proxied subject
        subject: String,
        /// The operation that missed
        key: OperationKey,
    },

    /// A subject failure captured while recording, raised again at the call boundary
    #[error("{0}")]
    Raised(CapturedFailure),

    /// A subject failure passed through untouched (disabled mode, item writes and deletes)
    #[error("{0}")]
    Subject(Fault),

    /// A reconstructed proxy was asked to reach its (non-existent) live subject
    #[error("ghost subject cannot perform {key}; reconstructed proxies only replay")]
    GhostInvoked {
        /// The operation that tried to reach the subject
        key: OperationKey,
    },

    /// Structurally invalid snapshot document
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A pass-through value was used where a proxy is required
    #[error("Not a proxy: {0}")]
    NotAProxy(String),

    /// Arguments do not fit the operation
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl CassetteError {
    /// The captured failure, if this error replays one
    pub fn captured(&self) -> Option<&CapturedFailure> {
        match self {
            CassetteError::Raised(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether this is a replay-only cache miss
    pub fn is_not_cached(&self) -> bool {
        matches!(self, CassetteError::NotCached { .. })
    }
}
