//! Store error types.

use crate::record::{ETag, RecordKey};
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by versioned stores and patch operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The stored version no longer matches the version the write was
    /// guarded by.
    #[error("Version conflict on {key}: record changed since version {expected}")]
    VersionConflict { key: RecordKey, expected: ETag },

    #[error("Record not found: {0}")]
    NotFound(RecordKey),

    #[error("Record already exists: {0}")]
    AlreadyExists(RecordKey),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A computed field mutation failed against the fresh record.
    #[error("Mutation of field '{field}' failed: {message}")]
    Mutation { field: String, message: String },

    #[error("Patch contains no field mutations")]
    EmptyPatch,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid continuation token '{0}'")]
    InvalidContinuation(String),

    /// Transient backend failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend failure that retrying cannot fix.
    #[error("Fatal backend error: {0}")]
    Fatal(String),
}

impl StoreError {
    /// Whether a retry executor should attempt the operation again.
    ///
    /// Everything is retryable except failures that are deterministic in the
    /// caller's input.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Fatal(_)
                | Self::EmptyPatch
                | Self::AlreadyExists(_)
                | Self::InvalidRecord(_)
                | Self::Serialization(_)
                | Self::InvalidContinuation(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::TableNotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
