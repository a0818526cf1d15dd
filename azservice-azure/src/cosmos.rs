//! Cosmos DB service.
//!
//! Containers are addressed by their configured reference name. Every store
//! call runs under the service's [`RetryExecutor`]; `patch_atomic` is an
//! ETag-guarded read-modify-write.

use crate::settings::{CosmosContainer, CosmosDbSettings};
use crate::{AzureError, Result};
use azservice_retry::RetryExecutor;
use azservice_store::{
    ETag, Fields, MemoryStore, Mutations, OptimisticPatch, PartitionKey, PatchReceipt, RecordKey,
    StoreError, VersionedStore,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Field every Cosmos DB record is identified by.
pub const ID_FIELD: &str = "id";

/// Field the time-to-live in seconds is written to.
pub const TTL_FIELD: &str = "ttl";

/// Cosmos DB service over one [`VersionedStore`] per container.
pub struct CosmosDbService {
    settings: CosmosDbSettings,
    executor: RetryExecutor,
    stores: RwLock<HashMap<String, Arc<dyn VersionedStore>>>,
}

impl CosmosDbService {
    /// Create a service with no container stores bound yet.
    pub fn new(settings: CosmosDbSettings, executor: RetryExecutor) -> Self {
        info!(
            database = %settings.database_name,
            containers = settings.containers.len(),
            "Cosmos DB service initialized"
        );
        Self {
            settings,
            executor,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Create a service with an in-memory store for every configured
    /// container.
    pub fn in_memory(settings: CosmosDbSettings, executor: RetryExecutor) -> Self {
        let service = Self::new(settings, executor);
        for container in &service.settings.containers {
            service.bind_container(&container.id, Arc::new(MemoryStore::new()));
        }
        service
    }

    /// Bind the store backing container `container_id`.
    pub fn with_container_store(self, container_id: impl Into<String>, store: Arc<dyn VersionedStore>) -> Self {
        self.bind_container(container_id, store);
        self
    }

    /// Bind or replace the store backing container `container_id`.
    pub fn bind_container(&self, container_id: impl Into<String>, store: Arc<dyn VersionedStore>) {
        let container_id = container_id.into();
        debug!(container = %container_id, "Cosmos DB container store bound");
        self.stores.write().insert(container_id, store);
    }

    pub fn settings(&self) -> &CosmosDbSettings {
        &self.settings
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Replace the retry policy used by this service.
    pub fn configure_retry_policy(&self, max_retries: u32, delay: Duration, max_delay: Duration) {
        self.executor.configure(max_retries, delay, max_delay);
    }

    fn container(&self, reference: &str) -> Result<(&CosmosContainer, Arc<dyn VersionedStore>)> {
        let container = self
            .settings
            .container(reference)
            .ok_or_else(|| AzureError::ContainerNotConfigured(reference.to_string()))?;
        let store = self
            .stores
            .read()
            .get(&container.id)
            .cloned()
            .ok_or_else(|| AzureError::ContainerNotBound(container.id.clone()))?;
        Ok((container, store))
    }

    /// Read a record. A missing record is `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        container_reference: &str,
        partition_key: impl Into<PartitionKey>,
        id: &str,
    ) -> Result<Option<T>> {
        let (_, store) = self.container(container_reference)?;
        let key = RecordKey::new(partition_key, id);

        let result = self
            .executor
            .run_if(|| store.read(&key), |e| e.is_retryable() && !e.is_not_found())
            .await;

        match result {
            Ok(record) => Ok(Some(record.to_entity()?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every record of a container whose fields satisfy `filter`.
    pub async fn get_all<T, F>(&self, container_reference: &str, filter: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&Fields) -> bool,
    {
        let (_, store) = self.container(container_reference)?;

        let records = self
            .executor
            .run_if(|| store.list(None), StoreError::is_retryable)
            .await?;

        records
            .iter()
            .filter(|record| filter(&record.fields))
            .map(|record| record.to_entity().map_err(AzureError::from))
            .collect()
    }

    /// Create or replace `entity`.
    ///
    /// The entity must serialize to an object holding a string `id` and the
    /// container's partition key field. `time_to_live` falls back to the
    /// container's configured default.
    pub async fn upsert<T: Serialize>(
        &self,
        entity: &T,
        container_reference: &str,
        time_to_live: Option<i64>,
    ) -> Result<ETag> {
        let (container, store) = self.container(container_reference)?;
        let mut fields = to_fields(entity)?;
        let key = record_key(container, &fields)?;

        if let Some(ttl) = time_to_live.or(container.time_to_live) {
            fields.insert(TTL_FIELD.to_string(), Value::from(ttl));
        }

        let etag = self
            .executor
            .run_if(|| store.upsert(&key, fields.clone()), StoreError::is_retryable)
            .await?;

        debug!(container = %container.id, %key, "Record upserted");
        Ok(etag)
    }

    /// Apply `mutations` to a record with an ETag-guarded write, re-reading
    /// the record on every attempt.
    pub async fn patch_atomic(
        &self,
        mutations: &Mutations,
        container_reference: &str,
        partition_key: impl Into<PartitionKey>,
        id: &str,
    ) -> Result<PatchReceipt> {
        let (container, store) = self.container(container_reference)?;
        let key = RecordKey::new(partition_key, id);

        let pk_field = container.partition_key_field();
        if let Some(field) = mutations
            .fields()
            .find(|field| *field == ID_FIELD || *field == pk_field)
        {
            return Err(StoreError::InvalidRecord(format!(
                "patch on {} cannot change key property '{}'",
                key, field
            ))
            .into());
        }

        Ok(OptimisticPatch::new(store.as_ref(), &self.executor)
            .patch(&key, mutations)
            .await?)
    }

    /// Delete the record `entity` identifies.
    pub async fn delete<T: Serialize>(&self, entity: &T, container_reference: &str) -> Result<()> {
        let (container, store) = self.container(container_reference)?;
        let key = record_key(container, &to_fields(entity)?)?;
        let any = ETag::any();

        self.executor
            .run_if(|| store.delete(&key, &any), |e| e.is_retryable() && !e.is_not_found())
            .await?;

        debug!(container = %container.id, %key, "Record deleted");
        Ok(())
    }
}

fn to_fields<T: Serialize>(entity: &T) -> Result<Fields> {
    match serde_json::to_value(entity)? {
        Value::Object(fields) => Ok(fields),
        other => Err(AzureError::InvalidEntity(format!(
            "entity must serialize to an object, got {}",
            kind(&other)
        ))),
    }
}

fn record_key(container: &CosmosContainer, fields: &Fields) -> Result<RecordKey> {
    let id = match fields.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => {
            return Err(AzureError::InvalidEntity(
                "cannot find the id property".to_string(),
            ));
        }
    };

    let pk_field = container.partition_key_field();
    let partition_key = fields
        .get(pk_field)
        .and_then(PartitionKey::from_value)
        .ok_or_else(|| {
            AzureError::InvalidEntity(format!(
                "partition key property '{}' is missing or not a string, boolean or integer",
                pk_field
            ))
        })?;

    Ok(RecordKey { partition_key, id })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
