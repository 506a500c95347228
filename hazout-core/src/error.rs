//! Error types for indexing hazard results.
//!
//! Key-level failures ([`IndexError::MalformedKey`], [`IndexError::UnknownClassifier`])
//! are raised by the classifier; the remaining variants describe failures of a
//! whole invocation.

use std::time::Duration;

/// Boxed error returned by object-store and calculator implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// The result type used throughout the indexer.
pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A bucket key whose segment structure cannot be classified.
    #[error("malformed key [{key}]: {reason}")]
    MalformedKey { key: String, reason: String },

    /// The classifier segment names no source type, ground motion model or IMT.
    #[error("Source type [{0}] not supported")]
    UnknownClassifier(String),

    /// A listing call to the object store failed.
    #[error("object store unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("indexing timed out after {0:?}")]
    Timeout(Duration),

    #[error("indexing cancelled")]
    Cancelled,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl IndexError {
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a failed listing call.
    pub fn store(source: StoreError) -> Self {
        IndexError::StoreUnavailable {
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        IndexError::Internal {
            message: message.into(),
        }
    }

    /// True for failures attributable to a single key rather than the invocation.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            IndexError::MalformedKey { .. } | IndexError::UnknownClassifier(_)
        )
    }
}
