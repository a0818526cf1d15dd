//! Azure services container.

use crate::cosmos::CosmosDbService;
use crate::settings::{CosmosDbSettings, StorageSettings};
use crate::table::TableStorageService;
use crate::{AzureError, Result};
use azservice_config::ConfigManager;
use azservice_retry::{RetryExecutor, RetryPolicySettings};
use azservice_store::{MemoryTables, TableBackend, VersionedStore};
use std::sync::Arc;
use tracing::info;

/// Container for the configured service facades.
///
/// A service is present only when its configuration section exists. Each
/// service gets its own [`RetryExecutor`] built from the `RetryPolicy`
/// section, so reconfiguring one leaves the others untouched.
pub struct AzureServices {
    retry_settings: RetryPolicySettings,
    cosmos: Option<CosmosDbService>,
    tables: Option<TableStorageService>,
}

impl AzureServices {
    pub fn builder(config: &ConfigManager) -> AzureServicesBuilder<'_> {
        AzureServicesBuilder::new(config)
    }

    /// Build every configured service over in-memory stores.
    pub fn in_memory(config: &ConfigManager) -> Result<Arc<Self>> {
        Self::builder(config).in_memory().build()
    }

    /// Retry policy the services were created with.
    pub fn retry_settings(&self) -> &RetryPolicySettings {
        &self.retry_settings
    }

    /// Get the Cosmos DB service.
    pub fn cosmos(&self) -> Result<&CosmosDbService> {
        self.cosmos
            .as_ref()
            .ok_or_else(|| AzureError::not_configured("cosmos"))
    }

    /// Get the Table Storage service.
    pub fn tables(&self) -> Result<&TableStorageService> {
        self.tables
            .as_ref()
            .ok_or_else(|| AzureError::not_configured("tables"))
    }
}

/// Builder for [`AzureServices`].
pub struct AzureServicesBuilder<'a> {
    config: &'a ConfigManager,
    container_stores: Vec<(String, Arc<dyn VersionedStore>)>,
    table_backend: Option<Arc<dyn TableBackend>>,
    in_memory: bool,
}

impl<'a> AzureServicesBuilder<'a> {
    fn new(config: &'a ConfigManager) -> Self {
        Self {
            config,
            container_stores: Vec::new(),
            table_backend: None,
            in_memory: false,
        }
    }

    /// Back Cosmos DB container `container_id` with `store`.
    pub fn container_store(mut self, container_id: impl Into<String>, store: Arc<dyn VersionedStore>) -> Self {
        self.container_stores.push((container_id.into(), store));
        self
    }

    /// Back Table Storage with `backend`.
    pub fn table_backend(mut self, backend: Arc<dyn TableBackend>) -> Self {
        self.table_backend = Some(backend);
        self
    }

    /// Use in-memory stores for everything not bound explicitly.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Bind and validate the configured sections and create the services.
    pub fn build(self) -> Result<Arc<AzureServices>> {
        let retry_settings: RetryPolicySettings = self
            .config
            .section_or_default(RetryPolicySettings::CONFIGURATION_KEY)?;

        let cosmos = if self.config.has(CosmosDbSettings::CONFIGURATION_KEY) {
            let settings: CosmosDbSettings = self.config.section(CosmosDbSettings::CONFIGURATION_KEY)?;
            let executor = RetryExecutor::from_settings(&retry_settings);
            let service = if self.in_memory {
                CosmosDbService::in_memory(settings, executor)
            } else {
                CosmosDbService::new(settings, executor)
            };
            for (container_id, store) in self.container_stores {
                service.bind_container(container_id, store);
            }
            Some(service)
        } else {
            None
        };

        let tables = if self.config.has(StorageSettings::CONFIGURATION_KEY) {
            let settings: StorageSettings = self.config.section(StorageSettings::CONFIGURATION_KEY)?;
            let backend: Arc<dyn TableBackend> = match (self.table_backend, self.in_memory) {
                (Some(backend), _) => backend,
                (None, true) => Arc::new(MemoryTables::new()),
                (None, false) => return Err(AzureError::not_configured("table backend")),
            };
            Some(TableStorageService::new(
                settings,
                backend,
                RetryExecutor::from_settings(&retry_settings),
            ))
        } else {
            None
        };

        info!(
            cosmos = cosmos.is_some(),
            tables = tables.is_some(),
            max_retries = retry_settings.max_retries,
            "Azure services initialized"
        );

        Ok(Arc::new(AzureServices {
            retry_settings,
            cosmos,
            tables,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azservice_config::FileFormat;
    use azservice_retry::RetryConfig;
    use azservice_store::MemoryStore;
    use std::time::Duration;

    const SETTINGS: &str = r#"{
        "RetryPolicy": {"MaxRetries": 3, "DelayMilliseconds": 20, "MaxDelayMilliseconds": 200},
        "Azure": {
            "CosmosDb": {
                "ConnectionString": "AccountEndpoint=https://localhost:8081/;AccountKey=k==",
                "DatabaseName": "app",
                "Containers": [{"Reference": "users", "Id": "users-v2", "DefaultPartitionKey": "email"}]
            },
            "Storage": {"ApiVersion": "2019-02-02", "ConnectionString": "UseDevelopmentStorage=true"}
        }
    }"#;

    fn config(json: &str) -> ConfigManager {
        let config = ConfigManager::new();
        config.load_str(json, FileFormat::Json).unwrap();
        config
    }

    #[test]
    fn test_in_memory_services() {
        let services = AzureServices::in_memory(&config(SETTINGS)).unwrap();

        let cosmos = services.cosmos().unwrap();
        assert_eq!(cosmos.settings().database_name, "app");
        assert_eq!(
            cosmos.executor().config(),
            RetryConfig::new(3, Duration::from_millis(20), Duration::from_millis(200))
        );
        assert_eq!(services.tables().unwrap().settings().api_version, "2019-02-02");
    }

    #[test]
    fn test_executors_are_independent() {
        let services = AzureServices::in_memory(&config(SETTINGS)).unwrap();

        services
            .cosmos()
            .unwrap()
            .configure_retry_policy(0, Duration::ZERO, Duration::ZERO);

        assert_eq!(services.tables().unwrap().executor().config().max_retries, 3);
    }

    #[test]
    fn test_missing_sections() {
        let services = AzureServices::in_memory(&config(r#"{"Other": 1}"#)).unwrap();

        assert!(matches!(services.cosmos(), Err(AzureError::NotConfigured(_))));
        assert!(matches!(services.tables(), Err(AzureError::NotConfigured(_))));
        assert_eq!(services.retry_settings(), &RetryPolicySettings::default());
    }

    #[test]
    fn test_invalid_section_is_rejected() {
        let invalid = r#"{"Azure": {"CosmosDb": {"ConnectionString": "", "DatabaseName": "app"}}}"#;
        let err = AzureServices::in_memory(&config(invalid)).err().unwrap();
        assert!(matches!(err, AzureError::Config(_)));
    }

    #[test]
    fn test_table_backend_required_outside_memory_mode() {
        let storage = r#"{"Azure": {"Storage": {"ApiVersion": "1", "ConnectionString": "UseDevelopmentStorage=true"}}}"#;

        let err = AzureServices::builder(&config(storage)).build().err().unwrap();
        assert!(matches!(err, AzureError::NotConfigured(_)));

        let services = AzureServices::builder(&config(storage))
            .table_backend(Arc::new(MemoryTables::new()))
            .build()
            .unwrap();
        assert!(services.tables().is_ok());
    }

    #[tokio::test]
    async fn test_explicit_container_store() {
        let store = Arc::new(MemoryStore::new());
        let services = AzureServices::builder(&config(SETTINGS))
            .container_store("users-v2", store.clone())
            .table_backend(Arc::new(MemoryTables::new()))
            .build()
            .unwrap();

        let user = serde_json::json!({"id": "a@x", "email": "a@x"});
        services.cosmos().unwrap().upsert(&user, "users", None).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
