//! # azservice Store
//!
//! Versioned record stores and optimistic read-modify-write.
//!
//! Records carry an [`ETag`] that changes on every write. An
//! [`OptimisticPatch`] reads the record, resolves its [`Mutations`] against
//! that read and writes back only if the version is unchanged, retrying the
//! whole cycle through a [`RetryExecutor`](azservice_retry::RetryExecutor)
//! when another writer got there first.
//!
//! ## Quick Start
//!
//! ```rust
//! use azservice_retry::{RetryConfig, RetryExecutor};
//! use azservice_store::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> azservice_store::Result<()> {
//! let store = MemoryStore::new();
//! let key = RecordKey::new("jobs", "42");
//! let mut fields = Fields::new();
//! fields.insert("counter".into(), json!(5));
//! store.insert(&key, fields).await?;
//!
//! let executor = RetryExecutor::new(RetryConfig::default());
//! let mutations = Mutations::new()
//!     .set("status", "done")
//!     .increment("counter", 1);
//!
//! let receipt = patch(&store, &executor, &key, &mutations).await?;
//! assert_eq!(receipt.attempts, 1);
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod mutation;
mod patch;
mod record;
mod store;

pub use error::{Result, StoreError};
pub use memory::{MemoryStore, MemoryTables};
pub use mutation::{FieldMutation, Mutations};
pub use patch::{Concurrency, OptimisticPatch, PatchPhase, PatchReceipt, patch};
pub use record::{ETag, Fields, PartitionKey, RecordKey, VersionedRecord};
pub use store::{RecordPage, TableBackend, VersionedStore};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::error::{Result, StoreError};
    pub use crate::memory::{MemoryStore, MemoryTables};
    pub use crate::mutation::{FieldMutation, Mutations};
    pub use crate::patch::{Concurrency, OptimisticPatch, PatchReceipt, patch};
    pub use crate::record::{ETag, Fields, PartitionKey, RecordKey, VersionedRecord};
    pub use crate::store::{RecordPage, TableBackend, VersionedStore};
}
