//! Versioned store traits.

use crate::error::{Result, StoreError};
use crate::record::{ETag, Fields, PartitionKey, RecordKey, VersionedRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// One page of a listing and the token that resumes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    pub records: Vec<VersionedRecord>,
    /// `None` on the last page.
    pub continuation: Option<String>,
}

impl RecordPage {
    /// Cut a page of at most `limit` records out of a full, stably ordered
    /// listing. The continuation token is the offset of the next page.
    pub fn from_listing(
        mut records: Vec<VersionedRecord>,
        continuation: Option<&str>,
        limit: usize,
    ) -> Result<Self> {
        let offset = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidContinuation(token.to_string()))?,
            None => 0,
        };
        if offset > records.len() {
            return Err(StoreError::InvalidContinuation(offset.to_string()));
        }

        let end = offset.saturating_add(limit.max(1)).min(records.len());
        let continuation = (end < records.len()).then(|| end.to_string());
        records.truncate(end);

        Ok(Self {
            records: records.split_off(offset),
            continuation,
        })
    }
}

/// A keyed record store that versions every record with an [`ETag`].
///
/// Implementations must make [`conditional_write`](Self::conditional_write)
/// atomic: the version check and the write happen as one step, so two
/// writers guarded by the same version cannot both succeed.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Read a record together with its current version.
    async fn read(&self, key: &RecordKey) -> Result<VersionedRecord>;

    /// Merge `fields` into an existing record if its version still matches
    /// `expected`.
    ///
    /// Returns the new version. Fails with `VersionConflict` when the record
    /// changed since `expected` was read and with `NotFound` when it is gone.
    async fn conditional_write(&self, key: &RecordKey, fields: Fields, expected: &ETag) -> Result<ETag>;

    /// Create a record; fails with `AlreadyExists` if the key is taken.
    async fn insert(&self, key: &RecordKey, fields: Fields) -> Result<ETag>;

    /// Create or fully replace a record.
    async fn upsert(&self, key: &RecordKey, fields: Fields) -> Result<ETag>;

    /// Delete a record if its version matches `expected`.
    async fn delete(&self, key: &RecordKey, expected: &ETag) -> Result<()>;

    /// List records, optionally restricted to one partition.
    async fn list(&self, partition_key: Option<&PartitionKey>) -> Result<Vec<VersionedRecord>>;

    /// List at most `limit` records starting at `continuation`.
    ///
    /// The default pages over [`list`](Self::list), which must then return
    /// records in a stable order.
    async fn list_page(
        &self,
        partition_key: Option<&PartitionKey>,
        continuation: Option<&str>,
        limit: usize,
    ) -> Result<RecordPage> {
        let records = self.list(partition_key).await?;
        RecordPage::from_listing(records, continuation, limit)
    }
}

/// A collection of named tables, each a [`VersionedStore`].
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Create `table` unless it exists. Returns whether it was created.
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool>;

    /// Handle to an existing table.
    async fn table(&self, table: &str) -> Result<Arc<dyn VersionedStore>>;

    /// Delete `table` and every record in it.
    async fn delete_table(&self, table: &str) -> Result<()>;
}
