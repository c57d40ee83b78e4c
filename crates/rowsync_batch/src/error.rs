//! Error types for batch operations.

use std::io;
use thiserror::Error;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while producing or reading batches.
#[derive(Debug, Error)]
pub enum BatchError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A batch index does not fit in the four digit file name slot.
    #[error("batch index overflow: {index} does not fit in 4 digits, increase the batch size")]
    IndexOverflow {
        /// The rejected index.
        index: u32,
    },

    /// No serializer is registered under the manifest's key.
    #[error("unknown batch serializer: {key}")]
    UnknownSerializer {
        /// The serializer key.
        key: String,
    },

    /// The manifest is missing or malformed.
    #[error("invalid batch manifest: {message}")]
    InvalidManifest {
        /// Description of the problem.
        message: String,
    },

    /// The operation was cancelled.
    #[error("batch operation cancelled")]
    Cancelled,
}

impl BatchError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid manifest error.
    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// Creates an unknown serializer error.
    pub fn unknown_serializer(key: impl Into<String>) -> Self {
        Self::UnknownSerializer { key: key.into() }
    }
}
