// Environment variable loading

use crate::{ConfigError, Result, SECTION_SEPARATOR};
use serde_json::Value;
use std::env;

/// Separator used in variable names in place of `:`, which most shells reject.
pub const ENV_SECTION_SEPARATOR: &str = "__";

/// Environment variable loader.
///
/// `APP__RetryPolicy__MaxRetries=5` with prefix `APP` yields the key
/// `RetryPolicy:MaxRetries` bound to the number `5`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all matching environment variables as `(section path, value)` pairs
    pub fn load(&self) -> Result<Vec<(String, Value)>> {
        Ok(self.collect(env::vars()))
    }

    /// Map raw `(name, value)` pairs the same way [`EnvLoader::load`] does.
    pub fn collect<I>(&self, vars: I) -> Vec<(String, Value)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries = Vec::new();

        for (key, value) in vars {
            let name = match self.prefix {
                Some(ref prefix) => match key.strip_prefix(prefix.as_str()) {
                    Some(rest) => rest.trim_start_matches('_'),
                    None => continue,
                },
                None => key.as_str(),
            };

            if name.is_empty() {
                continue;
            }

            let path = name.replace(ENV_SECTION_SEPARATOR, SECTION_SEPARATOR);
            entries.push((path, scalar_value(&value)));
        }

        entries
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key),
            None => key.to_string(),
        };

        env::var(&full_key).map_err(|source| ConfigError::EnvError {
            name: full_key.clone(),
            source,
        })
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Interpret a raw string as a number or boolean when it parses as one.
pub(crate) fn scalar_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_and_separator() {
        let loader = EnvLoader::new(Some("AZSERVICE".to_string()));
        let entries = loader.collect(vars(&[
            ("AZSERVICE__RetryPolicy__MaxRetries", "4"),
            ("OTHER_VAR", "ignored"),
        ]));

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "RetryPolicy:MaxRetries");
        assert_eq!(entries[0].1, Value::from(4));
    }

    #[test]
    fn test_scalar_values() {
        assert_eq!(scalar_value("true"), Value::Bool(true));
        assert_eq!(scalar_value("250"), Value::from(250));
        assert_eq!(scalar_value("UseDevelopmentStorage=true"), Value::from("UseDevelopmentStorage=true"));
        assert_eq!(scalar_value("\"quoted\""), Value::from("\"quoted\""));
    }

    #[test]
    fn test_env_loader_with_default() {
        let loader = EnvLoader::new(None);
        let value = loader.load_var_or("NONEXISTENT_VAR_12345", "default");

        assert_eq!(value, "default");
    }

    #[test]
    fn test_env_loader_missing_var() {
        let loader = EnvLoader::new(Some("AZSERVICE_TEST".to_string()));
        assert!(loader.load_var("MISSING_VAR_67890").is_err());
    }
}
