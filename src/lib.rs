// azservice - Retried, ETag-guarded access to Cosmos DB and Table Storage style stores
//
// This library bundles a reconfigurable exponential-backoff retry executor with
// an optimistic read-modify-write primitive and the service facades built on them.

// Re-export the retry executor and the store layer
pub use azservice_retry::{
    BackoffState, CancellationToken, MAX_BACKOFF_EXPONENT, RetryConfig, RetryExecutor,
    RetryPolicySettings,
};
pub use azservice_store::{
    Concurrency, ETag, FieldMutation, Fields, MemoryStore, MemoryTables, Mutations,
    OptimisticPatch, PartitionKey, PatchPhase, PatchReceipt, RecordKey, RecordPage, StoreError,
    TableBackend, VersionedRecord, VersionedStore, patch,
};

// Re-export member crates
pub use azservice_config;
pub use azservice_retry;
pub use azservice_store;

#[cfg(feature = "azure")]
pub use azservice_azure;

// Prelude for common imports
pub mod prelude {
    pub use azservice_config::{ConfigManager, FileFormat, Validate};
    pub use azservice_retry::{CancellationToken, RetryConfig, RetryExecutor, RetryPolicySettings};
    pub use azservice_store::{
        Concurrency, ETag, Fields, MemoryStore, MemoryTables, Mutations, OptimisticPatch,
        PartitionKey, PatchReceipt, RecordKey, StoreError, TableBackend, VersionedStore, patch,
    };

    #[cfg(feature = "azure")]
    pub use azservice_azure::{
        AzureError, AzureServices, CosmosContainer, CosmosDbService, CosmosDbSettings,
        StorageSettings, TableEntity, TableStorageService,
    };
}
