//! Configuration management for azservice.
//!
//! Settings live in a single JSON tree addressed by `:`-separated section
//! paths (`Azure:CosmosDb`), loaded from JSON, TOML or `.env` files and from
//! environment variables, then bound to typed settings structs.
//!
//! ```rust,no_run
//! use azservice_config::{ConfigManager, ConfigValidator, FileFormat, Validate};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct RetryPolicy {
//!     max_retries: u32,
//! }
//!
//! impl Validate for RetryPolicy {
//!     fn validate(&self) -> azservice_config::Result<()> {
//!         ConfigValidator::in_range(self.max_retries, 0, 10, "RetryPolicy: MaxRetries")
//!     }
//! }
//!
//! let config = ConfigManager::builder()
//!     .add_file("appsettings.json", FileFormat::Json)
//!     .with_prefix("AZSERVICE")
//!     .load_env()
//!     .build()?;
//!
//! let retry: RetryPolicy = config.section("RetryPolicy")?;
//! # Ok::<(), azservice_config::ConfigError>(())
//! ```

pub mod builder;
pub mod env;
pub mod error;
pub mod loader;
mod tree;
pub mod validation;

pub use builder::ConfigBuilder;
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Separator between section names in a configuration path.
pub const SECTION_SEPARATOR: &str = ":";

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    root: Arc<RwLock<Value>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create an empty configuration manager
    pub fn new() -> Self {
        Self {
            root: Arc::new(RwLock::new(Value::Object(serde_json::Map::new()))),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Builder for a manager assembled from several sources
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let entries = loader.load()?;

        let mut root = self.root.write();
        for (path, value) in entries {
            tree::insert_path(&mut root, &path, value);
        }

        Ok(())
    }

    /// Load configuration from .env file
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::load(path, e))?;
        } else {
            dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
        }
        self.load_env()
    }

    /// Load configuration from file, deep-merging it over what is loaded
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::new(format).load_file(path)?;
        debug!(path = %path.display(), ?format, "Configuration file loaded");

        self.merge_value(data);
        Ok(())
    }

    /// Parse configuration text and merge it over what is loaded
    pub fn load_str(&self, content: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).parse(content)?;
        self.merge_value(data);
        Ok(())
    }

    fn merge_value(&self, data: Value) {
        let mut root = self.root.write();
        tree::merge(&mut root, data);
    }

    /// Set a value at a section path
    pub fn set<T: serde::Serialize>(&self, path: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let mut root = self.root.write();
        tree::insert_path(&mut root, path, json_value);

        Ok(())
    }

    /// Get a value at a section path
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let root = self.root.read();

        let value = tree::get_path(&root, path)
            .ok_or_else(|| ConfigError::SectionNotFound(path.to_string()))?;

        serde_json::from_value(value.clone()).map_err(|e| ConfigError::BindError {
            section: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Get a value with default
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get(path).unwrap_or(default)
    }

    /// Bind and validate a settings section
    pub fn section<T: DeserializeOwned + Validate>(&self, path: &str) -> Result<T> {
        let settings: T = self.get(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Bind and validate a settings section, falling back to `T::default()`
    /// when the section is absent
    pub fn section_or_default<T: DeserializeOwned + Validate + Default>(&self, path: &str) -> Result<T> {
        if !self.has(path) {
            return Ok(T::default());
        }
        self.section(path)
    }

    /// Check if a section path exists
    pub fn has(&self, path: &str) -> bool {
        let root = self.root.read();
        tree::get_path(&root, path).is_some()
    }

    /// Top-level section names
    pub fn keys(&self) -> Vec<String> {
        let root = self.root.read();
        root.as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Merge configuration from another manager; `other` wins on conflicts
    pub fn merge(&self, other: &ConfigManager) {
        let overlay = other.root.read().clone();
        self.merge_value(overlay);
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
