//! Error types for hash index operations.
//!
//! Every error is `Clone`: a single batched cache fetch fans its result out to
//! all lookups that asked for the same bucket in that round.

use thiserror::Error;

/// Result type for hash index operations.
pub type MhashResult<T> = std::result::Result<T, MhashError>;

/// Errors that can occur during hash index operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MhashError {
    /// Descent needed more levels than [`MAX_DEEP_LEVELS`](crate::MAX_DEEP_LEVELS).
    ///
    /// Not retryable; the index has to be rebalanced by the write path.
    #[error("mhash: hash go too deep")]
    HashTooDeep,

    /// Cache backend operation failed.
    #[error("cache {operation} failed for '{key}': {message}")]
    Backend {
        /// Operation that failed (`get_multi`, `set_multi`, ...).
        operation: String,
        /// The cache key involved (first key of the batch for batched calls).
        key: String,
        /// The underlying error message.
        message: String,
    },

    /// Loading a bucket from the authoritative store failed.
    #[error("fill failed for '{key}': {message}")]
    Fill {
        /// Cache key of the bucket being filled.
        key: String,
        /// The underlying error message.
        message: String,
    },

    /// Bucket or item bytes could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the decoding error.
        message: String,
    },

    /// An item could not be encoded.
    #[error("encode error: {message}")]
    Encode {
        /// Description of the encoding error.
        message: String,
    },

    /// The lookup context was cancelled between rounds.
    #[error("lookup cancelled")]
    Cancelled,

    /// Generic internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl MhashError {
    /// Create a backend operation error.
    pub fn backend(
        operation: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MhashError::Backend {
            operation: operation.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a fill error.
    pub fn fill(key: impl Into<String>, message: impl Into<String>) -> Self {
        MhashError::Fill {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        MhashError::Decode {
            message: message.into(),
        }
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        MhashError::Encode {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        MhashError::Internal {
            message: message.into(),
        }
    }
}
