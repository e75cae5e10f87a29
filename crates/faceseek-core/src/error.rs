//! Error types for Faceseek operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used
//! across all Faceseek crates. Uses `thiserror` for derive macros.
//!
//! The taxonomy separates recoverable conditions (a corrupt index snapshot
//! is rebuilt from the embedding store) from fatal ones (a corrupt store is
//! surfaced to the caller — the store is the source of truth and nothing
//! can repair it locally).

use thiserror::Error;

/// Errors that can occur in Faceseek operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input vector length does not match the configured dimension.
    ///
    /// Vectors are rejected outright — never truncated or padded.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured embedding dimension.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// Persisted embedding store state could not be deserialized.
    ///
    /// Fatal: the store is authoritative, so the caller must treat it as
    /// empty and alert rather than resume with partial data.
    #[error("corrupt embedding store: {0}")]
    CorruptStore(String),

    /// Persisted index state could not be deserialized or fails validation.
    ///
    /// Recoverable: the index is rebuilt from the embedding store.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A search session no longer exists or has passed its idle timeout.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Index count diverged from the embedding store count.
    ///
    /// Recoverable internal event: triggers a forced rebuild, never
    /// silently ignored.
    #[error("index invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a corrupt store error.
    pub fn corrupt_store(msg: impl Into<String>) -> Self {
        Self::CorruptStore(msg.into())
    }

    /// Create a corrupt index error.
    pub fn corrupt_index(msg: impl Into<String>) -> Self {
        Self::CorruptIndex(msg.into())
    }

    /// Create a session expired error.
    pub fn session_expired(msg: impl Into<String>) -> Self {
        Self::SessionExpired(msg.into())
    }

    /// Create an invariant violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error is recoverable by rebuilding from the store.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CorruptIndex(_) | Self::InvariantViolation(_)
        )
    }
}

/// Result type alias using Faceseek's Error type.
pub type Result<T> = std::result::Result<T, Error>;
