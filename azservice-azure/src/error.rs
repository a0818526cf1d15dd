//! Azure service errors.

use azservice_config::ConfigError;
use azservice_store::StoreError;
use thiserror::Error;

/// Result type for Azure service operations.
pub type Result<T> = std::result::Result<T, AzureError>;

/// Errors raised by the Azure service facades.
#[derive(Debug, Error)]
pub enum AzureError {
    /// Failure reported by the underlying store, unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cosmos DB container reference not configured: {0}")]
    ContainerNotConfigured(String),

    #[error("No store registered for Cosmos DB container: {0}")]
    ContainerNotBound(String),

    #[error("The table client has not been initialized")]
    TableClientNotInitialized,

    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Records per page must be between 1 and {max}, got {requested}")]
    PageSize { requested: usize, max: usize },

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AzureError {
    /// Create a "not configured" error for a service.
    pub fn not_configured(service: &str) -> Self {
        Self::NotConfigured(service.to_string())
    }

    /// The store failure behind this error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the operation lost an optimistic concurrency race on every
    /// attempt.
    pub fn is_conflict(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_conflict)
    }

    pub fn is_not_found(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azservice_store::{ETag, RecordKey};

    #[test]
    fn test_store_error_passes_through() {
        let err = AzureError::from(StoreError::VersionConflict {
            key: RecordKey::new("p", "1"),
            expected: ETag::new("v1"),
        });

        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Version conflict on p/1: record changed since version v1"
        );
    }

    #[test]
    fn test_not_configured() {
        let err = AzureError::not_configured("cosmos");
        assert_eq!(err.to_string(), "Service not configured: cosmos");
        assert!(err.store_error().is_none());
    }
}
