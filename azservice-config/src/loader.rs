// Configuration file loaders

use crate::env::{ENV_SECTION_SEPARATOR, scalar_value};
use crate::{ConfigError, Result, SECTION_SEPARATOR, tree};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    /// Flat `KEY=value` lines, `__` nesting like environment variables.
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            "env" => Some(Self::Env),
            _ => None,
        }
    }

    /// Guess the format of `path`; a bare `.env` file counts as [`FileFormat::Env`].
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.file_name().and_then(|n| n.to_str()) == Some(".env") {
            return Some(Self::Env);
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
            Self::Env => "env",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses one configuration source into a JSON object tree.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the loader from the file name of `path`.
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        FileFormat::from_path(path)
            .map(Self::new)
            .ok_or_else(|| ConfigError::load(path.display().to_string(), "unrecognised file format"))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::load(path.display().to_string(), e))?;

        self.parse(&content)
    }

    /// Parse configuration text; the result is always a JSON object.
    pub fn parse(&self, content: &str) -> Result<Value> {
        let value = match self.format {
            FileFormat::Json => serde_json::from_str::<Value>(content).map_err(|e| self.malformed(e))?,
            FileFormat::Toml => {
                let table: toml::Table = toml::from_str(content).map_err(|e| self.malformed(e))?;
                serde_json::to_value(table).map_err(|e| self.malformed(e))?
            }
            FileFormat::Env => parse_env_lines(content),
        };

        if !value.is_object() {
            return Err(self.malformed("root must be an object"));
        }
        Ok(value)
    }

    fn malformed(&self, message: impl ToString) -> ConfigError {
        ConfigError::ParseError {
            format: self.format.name(),
            message: message.to_string(),
        }
    }
}

fn parse_env_lines(content: &str) -> Value {
    let mut root = Value::Object(Map::new());

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let path = key.trim().replace(ENV_SECTION_SEPARATOR, SECTION_SEPARATOR);
        let value = value.trim().trim_matches('"').trim_matches('\'');
        tree::insert_path(&mut root, &path, scalar_value(value));
    }

    root
}
