//! Connection string parsing.
//!
//! Azure connection strings are `;`-separated `Key=Value` pairs. Keys are
//! matched case-insensitively; values may themselves contain `=` (account
//! keys are base64).

use crate::{AzureError, Result};
use std::collections::HashMap;
use url::Url;

/// Table endpoint of the local storage emulator.
pub const EMULATOR_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

/// Parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: HashMap<String, String>,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut pairs = HashMap::new();

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                AzureError::InvalidConnectionString(format!("expected Key=Value, got '{}'", part))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(AzureError::InvalidConnectionString(format!(
                    "empty key in '{}'",
                    part
                )));
            }
            pairs.insert(key.to_ascii_lowercase(), value.trim().to_string());
        }

        if pairs.is_empty() {
            return Err(AzureError::InvalidConnectionString(
                "connection string is empty".to_string(),
            ));
        }

        Ok(Self { pairs })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    fn url(&self, key: &str) -> Result<Url> {
        let raw = self
            .get(key)
            .ok_or_else(|| AzureError::InvalidConnectionString(format!("{} is missing", key)))?;
        Url::parse(raw)
            .map_err(|e| AzureError::InvalidConnectionString(format!("{}: {}", key, e)))
    }

    /// Cosmos DB account endpoint (`AccountEndpoint`).
    pub fn account_endpoint(&self) -> Result<Url> {
        self.url("AccountEndpoint")
    }

    /// Whether the string points at the local storage emulator.
    pub fn uses_development_storage(&self) -> bool {
        self.get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Table service endpoint of a storage account.
    ///
    /// Uses `TableEndpoint` when present, the emulator endpoint for
    /// development storage, and otherwise builds it from
    /// `DefaultEndpointsProtocol`, `AccountName` and `EndpointSuffix`.
    pub fn table_endpoint(&self) -> Result<Url> {
        if self.get("TableEndpoint").is_some() {
            return self.url("TableEndpoint");
        }
        if self.uses_development_storage() {
            return Url::parse(EMULATOR_TABLE_ENDPOINT)
                .map_err(|e| AzureError::InvalidConnectionString(e.to_string()));
        }

        let account = self.get("AccountName").ok_or_else(|| {
            AzureError::InvalidConnectionString("AccountName is missing".to_string())
        })?;
        let protocol = self.get("DefaultEndpointsProtocol").unwrap_or("https");
        let suffix = self.get("EndpointSuffix").unwrap_or("core.windows.net");

        Url::parse(&format!("{}://{}.table.{}", protocol, account, suffix))
            .map_err(|e| AzureError::InvalidConnectionString(e.to_string()))
    }
}
