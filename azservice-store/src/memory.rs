//! In-memory store backends.

use crate::error::{Result, StoreError};
use crate::record::{ETag, Fields, PartitionKey, RecordKey, VersionedRecord};
use crate::store::{TableBackend, VersionedStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredRecord {
    etag: ETag,
    fields: Fields,
}

/// Thread-safe in-memory [`VersionedStore`].
///
/// Every write assigns a fresh random ETag. Version checks and writes run
/// under one write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    fn next_etag() -> ETag {
        ETag::new(format!("\"{}\"", Uuid::new_v4()))
    }

    fn to_record(key: &RecordKey, stored: &StoredRecord) -> VersionedRecord {
        VersionedRecord {
            key: key.clone(),
            etag: stored.etag.clone(),
            fields: stored.fields.clone(),
        }
    }
}

#[async_trait]
impl VersionedStore for MemoryStore {
    async fn read(&self, key: &RecordKey) -> Result<VersionedRecord> {
        self.records
            .read()
            .get(key)
            .map(|stored| Self::to_record(key, stored))
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn conditional_write(&self, key: &RecordKey, fields: Fields, expected: &ETag) -> Result<ETag> {
        let mut records = self.records.write();
        let stored = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if !expected.matches(&stored.etag) {
            trace!(%key, expected = %expected, current = %stored.etag, "Conditional write rejected");
            return Err(StoreError::VersionConflict {
                key: key.clone(),
                expected: expected.clone(),
            });
        }

        stored.fields.extend(fields);
        stored.etag = Self::next_etag();
        Ok(stored.etag.clone())
    }

    async fn insert(&self, key: &RecordKey, fields: Fields) -> Result<ETag> {
        let mut records = self.records.write();
        if records.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.clone()));
        }

        let etag = Self::next_etag();
        records.insert(
            key.clone(),
            StoredRecord {
                etag: etag.clone(),
                fields,
            },
        );
        Ok(etag)
    }

    async fn upsert(&self, key: &RecordKey, fields: Fields) -> Result<ETag> {
        let etag = Self::next_etag();
        self.records.write().insert(
            key.clone(),
            StoredRecord {
                etag: etag.clone(),
                fields,
            },
        );
        Ok(etag)
    }

    async fn delete(&self, key: &RecordKey, expected: &ETag) -> Result<()> {
        let mut records = self.records.write();
        let stored = records
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if !expected.matches(&stored.etag) {
            return Err(StoreError::VersionConflict {
                key: key.clone(),
                expected: expected.clone(),
            });
        }

        records.remove(key);
        Ok(())
    }

    async fn list(&self, partition_key: Option<&PartitionKey>) -> Result<Vec<VersionedRecord>> {
        let records = self.records.read();
        let mut listed: Vec<_> = records
            .iter()
            .filter(|(key, _)| partition_key.is_none_or(|pk| &key.partition_key == pk))
            .map(|(key, stored)| Self::to_record(key, stored))
            .collect();
        listed.sort_by(|a, b| {
            a.key
                .id
                .cmp(&b.key.id)
                .then_with(|| a.key.partition_key.to_string().cmp(&b.key.partition_key.to_string()))
        });
        Ok(listed)
    }
}

/// In-memory [`TableBackend`]. Table names are case-insensitive.
#[derive(Debug, Default)]
pub struct MemoryTables {
    tables: RwLock<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TableBackend for MemoryTables {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool> {
        let mut tables = self.tables.write();
        let name = table.to_lowercase();
        if tables.contains_key(&name) {
            return Ok(false);
        }
        tables.insert(name, Arc::new(MemoryStore::new()));
        Ok(true)
    }

    async fn table(&self, table: &str) -> Result<Arc<dyn VersionedStore>> {
        self.tables
            .read()
            .get(&table.to_lowercase())
            .map(|store| store.clone() as Arc<dyn VersionedStore>)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    async fn delete_table(&self, table: &str) -> Result<()> {
        self.tables
            .write()
            .remove(&table.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }
}
