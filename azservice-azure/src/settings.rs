//! Service settings bound from configuration sections.

use crate::connection::ConnectionString;
use azservice_config::{ConfigError, ConfigValidator, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A Cosmos DB container as referenced by application code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CosmosContainer {
    /// Name application code uses to pick the container.
    pub reference: String,
    /// Container id in the database.
    pub id: String,
    /// Entity field holding the partition key.
    pub default_partition_key: String,
    /// Default time-to-live in seconds for upserted records.
    #[serde(alias = "TimeToLIve")]
    pub time_to_live: Option<i64>,
}

impl CosmosContainer {
    pub fn new(
        reference: impl Into<String>,
        id: impl Into<String>,
        default_partition_key: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            id: id.into(),
            default_partition_key: default_partition_key.into(),
            time_to_live: None,
        }
    }

    pub fn with_time_to_live(mut self, seconds: i64) -> Self {
        self.time_to_live = Some(seconds);
        self
    }

    /// Partition key field name, tolerating a leading `/` path form.
    pub fn partition_key_field(&self) -> &str {
        self.default_partition_key.trim_start_matches('/')
    }
}

/// Cosmos DB settings (`Azure:CosmosDb`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CosmosDbSettings {
    pub connection_string: String,
    pub database_name: String,
    pub containers: Vec<CosmosContainer>,
}

impl CosmosDbSettings {
    /// Configuration section the settings are bound from.
    pub const CONFIGURATION_KEY: &'static str = "Azure:CosmosDb";

    /// Look up a container by its reference name.
    pub fn container(&self, reference: &str) -> Option<&CosmosContainer> {
        self.containers.iter().find(|c| c.reference == reference)
    }
}

impl Validate for CosmosDbSettings {
    fn validate(&self) -> azservice_config::Result<()> {
        ConfigValidator::not_empty(&self.connection_string, "Cosmos Db: ConnectionString")?;
        ConfigValidator::not_empty(&self.database_name, "Cosmos Db: DatabaseName")?;

        let connection = ConnectionString::parse(&self.connection_string)
            .map_err(|e| ConfigError::ValidationError(format!("Cosmos Db: {}", e)))?;
        connection
            .account_endpoint()
            .map_err(|e| ConfigError::ValidationError(format!("Cosmos Db: {}", e)))?;

        let mut references = HashSet::new();
        for container in &self.containers {
            ConfigValidator::not_empty(&container.reference, "Cosmos Db: container Reference")?;
            ConfigValidator::not_empty(&container.id, "Cosmos Db: container Id")?;
            ConfigValidator::not_empty(
                container.partition_key_field(),
                "Cosmos Db: container DefaultPartitionKey",
            )?;
            if !references.insert(container.reference.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Cosmos Db: container reference '{}' is defined twice",
                    container.reference
                )));
            }
        }
        Ok(())
    }
}

/// Storage account settings (`Azure:Storage`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StorageSettings {
    pub api_version: String,
    pub connection_string: String,
}

impl StorageSettings {
    /// Configuration section the settings are bound from.
    pub const CONFIGURATION_KEY: &'static str = "Azure:Storage";
}

impl Validate for StorageSettings {
    fn validate(&self) -> azservice_config::Result<()> {
        ConfigValidator::not_empty(&self.api_version, "Storage: ApiVersion")?;
        ConfigValidator::not_empty(&self.connection_string, "Storage: ConnectionString")?;

        ConnectionString::parse(&self.connection_string)
            .and_then(|c| c.table_endpoint())
            .map_err(|e| ConfigError::ValidationError(format!("Storage: {}", e)))?;
        Ok(())
    }
}
