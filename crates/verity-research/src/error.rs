//! Error types for the research tools.

use thiserror::Error;
use verity_xbrl::XbrlError;

/// Result type for research operations.
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Failures reported by a filing source.
///
/// Propagated with the source's message, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The requested filing does not exist at the source
    #[error("Filing not found: {0}")]
    NotFound(String),

    /// The source asked the caller to slow down
    #[error("Rate limited, retry after {retry_after_ms} ms")]
    RateLimited {
        /// Suggested wait before the next request
        retry_after_ms: u64,
    },

    /// The source could not be reached or read
    #[error("Filing source unavailable: {0}")]
    Unavailable(String),

    /// The source refused the request as malformed
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Errors that can occur while searching, fetching or extracting.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// A handle that was never issued or has been evicted
    #[error("Unknown object handle: {0}")]
    UnknownHandle(String),

    /// Two different referents produced the same handle
    #[error("Handle collision on {handle}: `{existing}` vs `{incoming}`")]
    HandleCollision {
        /// The colliding handle
        handle: String,
        /// Referent already registered under the handle
        existing: String,
        /// Referent that was being registered
        incoming: String,
    },

    /// Filing source error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Extraction error
    #[error(transparent)]
    Xbrl(#[from] XbrlError),

    /// A registered handle whose record is no longer cataloged
    #[error("Not found: {0}")]
    NotFound(String),

    /// A thread panicked while holding a lock
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResearchError {
    /// Short machine-readable name of the error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownHandle(_) => "unknown_handle",
            Self::HandleCollision { .. } => "handle_collision",
            Self::Provider(_) => "provider_error",
            Self::Xbrl(XbrlError::Extraction { .. }) => "extraction_error",
            Self::Xbrl(XbrlError::Reference(_)) => "reference_error",
            Self::Xbrl(_) => "xbrl_error",
            Self::NotFound(_) => "not_found",
            Self::LockPoisoned(_) => "lock_poisoned",
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }
}
