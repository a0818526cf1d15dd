//! Table Storage service.

use crate::settings::StorageSettings;
use crate::{AzureError, Result};
use azservice_retry::RetryExecutor;
use azservice_store::{
    Concurrency, ETag, Fields, MemoryTables, Mutations, OptimisticPatch, PatchReceipt, RecordKey,
    StoreError, TableBackend, VersionedRecord, VersionedStore,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Largest page a table query may request.
pub const MAX_RECORDS_PER_PAGE: usize = 1000;

/// A table row: partition key, row key and free-form properties.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    /// Version the entity was read at; `None` for entities built locally.
    pub etag: Option<ETag>,
    pub properties: Fields,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: None,
            properties: Fields::new(),
        }
    }

    /// Build an entity from a serializable value's fields.
    pub fn from_value<T: Serialize>(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(properties) => Ok(Self {
                properties,
                ..Self::new(partition_key, row_key)
            }),
            _ => Err(AzureError::InvalidEntity(
                "table entity properties must serialize to an object".to_string(),
            )),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Deserialize the properties into a typed value.
    pub fn to_value<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.properties.clone()))?)
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.partition_key.as_str(), self.row_key.as_str())
    }

    fn from_record(record: VersionedRecord) -> Self {
        Self {
            partition_key: record.key.partition_key.to_string(),
            row_key: record.key.id,
            etag: Some(record.etag),
            properties: record.fields,
        }
    }
}

/// Table Storage service over a [`TableBackend`].
///
/// Operations take an optional table name; `None` uses the table selected by
/// [`initialize_table_client`](Self::initialize_table_client).
pub struct TableStorageService {
    settings: StorageSettings,
    backend: Arc<dyn TableBackend>,
    executor: RetryExecutor,
    default_table: RwLock<Option<String>>,
}

impl TableStorageService {
    pub fn new(settings: StorageSettings, backend: Arc<dyn TableBackend>, executor: RetryExecutor) -> Self {
        info!(api_version = %settings.api_version, "Table Storage service initialized");
        Self {
            settings,
            backend,
            executor,
            default_table: RwLock::new(None),
        }
    }

    /// Create a service over in-memory tables.
    pub fn in_memory(settings: StorageSettings, executor: RetryExecutor) -> Self {
        Self::new(settings, Arc::new(MemoryTables::new()), executor)
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Replace the retry policy used by this service.
    pub fn configure_retry_policy(&self, max_retries: u32, delay: Duration, max_delay: Duration) {
        self.executor.configure(max_retries, delay, max_delay);
    }

    /// Select the default table, creating it first when `check_table` is set.
    pub async fn initialize_table_client(&self, table: &str, check_table: bool) -> Result<()> {
        if check_table {
            self.ensure_table(table).await?;
        }
        *self.default_table.write() = Some(table.to_string());
        debug!(table, "Default table selected");
        Ok(())
    }

    /// Name of the default table, if one was selected.
    pub fn default_table(&self) -> Option<String> {
        self.default_table.read().clone()
    }

    async fn ensure_table(&self, table: &str) -> Result<()> {
        let created = self
            .executor
            .run_if(
                || self.backend.create_table_if_not_exists(table),
                StoreError::is_retryable,
            )
            .await?;
        if created {
            info!(table, "Table created");
        }
        Ok(())
    }

    fn table_name(&self, table: Option<&str>) -> Result<String> {
        match table {
            Some(name) => Ok(name.to_string()),
            None => self
                .default_table
                .read()
                .clone()
                .ok_or(AzureError::TableClientNotInitialized),
        }
    }

    async fn table(&self, table: Option<&str>) -> Result<Arc<dyn VersionedStore>> {
        let name = self.table_name(table)?;
        Ok(self.backend.table(&name).await?)
    }

    /// Insert a new entity; fails if the row already exists.
    pub async fn add_record(&self, table: Option<&str>, entity: &TableEntity) -> Result<ETag> {
        let store = self.table(table).await?;
        let key = entity.key();

        let etag = self
            .executor
            .run_if(
                || store.insert(&key, entity.properties.clone()),
                StoreError::is_retryable,
            )
            .await?;
        debug!(%key, "Table record added");
        Ok(etag)
    }

    /// Insert or fully replace an entity.
    pub async fn upsert_record(&self, table: Option<&str>, entity: &TableEntity) -> Result<ETag> {
        let store = self.table(table).await?;
        let key = entity.key();

        Ok(self
            .executor
            .run_if(
                || store.upsert(&key, entity.properties.clone()),
                StoreError::is_retryable,
            )
            .await?)
    }

    /// Read one entity. A missing row is `Ok(None)`.
    pub async fn get_record(
        &self,
        table: Option<&str>,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>> {
        let store = self.table(table).await?;
        let key = RecordKey::new(partition_key, row_key);

        let result = self
            .executor
            .run_if(|| store.read(&key), |e| e.is_retryable() && !e.is_not_found())
            .await;

        match result {
            Ok(record) => Ok(Some(TableEntity::from_record(record))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Entities matching `filter`.
    ///
    /// The table is read from the backend in pages of at most
    /// `max_records_per_page` entities, each page retried on its own.
    pub async fn get_records<F>(
        &self,
        table: Option<&str>,
        filter: F,
        max_records_per_page: usize,
    ) -> Result<Vec<TableEntity>>
    where
        F: Fn(&TableEntity) -> bool,
    {
        if max_records_per_page == 0 || max_records_per_page > MAX_RECORDS_PER_PAGE {
            return Err(AzureError::PageSize {
                requested: max_records_per_page,
                max: MAX_RECORDS_PER_PAGE,
            });
        }

        let store = self.table(table).await?;

        let mut matched = Vec::new();
        let mut pages = 0usize;
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .executor
                .run_if(
                    || store.list_page(None, continuation.as_deref(), max_records_per_page),
                    StoreError::is_retryable,
                )
                .await?;
            pages += 1;
            matched.extend(
                page.records
                    .into_iter()
                    .map(TableEntity::from_record)
                    .filter(|entity| filter(entity)),
            );

            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        debug!(records = matched.len(), pages, "Table query completed");
        Ok(matched)
    }

    /// Count entities in `table` matching `filter`, creating the table if it
    /// does not exist.
    pub async fn count_records<F>(&self, table: &str, filter: F) -> Result<usize>
    where
        F: Fn(&TableEntity) -> bool,
    {
        self.ensure_table(table).await?;
        Ok(self
            .get_records(Some(table), filter, MAX_RECORDS_PER_PAGE)
            .await?
            .len())
    }

    /// Delete one entity regardless of its version.
    pub async fn delete_record(&self, table: Option<&str>, partition_key: &str, row_key: &str) -> Result<()> {
        let store = self.table(table).await?;
        let key = RecordKey::new(partition_key, row_key);
        let any = ETag::any();

        self.executor
            .run_if(|| store.delete(&key, &any), |e| e.is_retryable() && !e.is_not_found())
            .await?;
        debug!(%key, "Table record deleted");
        Ok(())
    }

    /// Overwrite properties of an existing entity.
    ///
    /// Every attempt reads the entity again; with
    /// `use_optimistic_concurrency` the write is guarded by the ETag of that
    /// read, otherwise it is unconditional.
    pub async fn update_record(
        &self,
        table: Option<&str>,
        partition_key: &str,
        row_key: &str,
        properties: Fields,
        use_optimistic_concurrency: bool,
    ) -> Result<PatchReceipt> {
        let concurrency = if use_optimistic_concurrency {
            Concurrency::Optimistic
        } else {
            Concurrency::LastWriterWins
        };
        self.patch_record(
            table,
            partition_key,
            row_key,
            &Mutations::from_fields(properties),
            concurrency,
        )
        .await
    }

    /// Apply literal or computed mutations to an existing entity.
    pub async fn patch_record(
        &self,
        table: Option<&str>,
        partition_key: &str,
        row_key: &str,
        mutations: &Mutations,
        concurrency: Concurrency,
    ) -> Result<PatchReceipt> {
        let store = self.table(table).await?;
        let key = RecordKey::new(partition_key, row_key);

        Ok(OptimisticPatch::new(store.as_ref(), &self.executor)
            .patch_with(&key, mutations, concurrency)
            .await?)
    }

    /// Delete a table and all of its entities.
    pub async fn remove_table(&self, table: &str) -> Result<()> {
        self.executor
            .run_if(
                || self.backend.delete_table(table),
                |e| e.is_retryable() && !e.is_not_found(),
            )
            .await?;

        let mut default_table = self.default_table.write();
        if default_table
            .as_deref()
            .is_some_and(|current| same_table(current, table))
        {
            *default_table = None;
        }
        info!(table, "Table removed");
        Ok(())
    }
}

// Table names compare the way the backend stores them.
fn same_table(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
