// Configuration errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// No value exists at the requested `:`-separated path.
    #[error("Configuration section '{0}' is not present")]
    SectionNotFound(String),

    /// A configuration source could not be read.
    #[error("Cannot read configuration source {source_name}: {message}")]
    LoadError { source_name: String, message: String },

    #[error("Malformed {format} configuration: {message}")]
    ParseError { format: &'static str, message: String },

    /// A bound settings section failed its own checks.
    #[error("Invalid settings: {0}")]
    ValidationError(String),

    #[error("Cannot convert value for '{path}': {message}")]
    SerializationError { path: String, message: String },

    #[error("Section '{section}' does not match the expected shape: {message}")]
    BindError { section: String, message: String },

    #[error("Environment variable {name}: {source}")]
    EnvError {
        name: String,
        #[source]
        source: std::env::VarError,
    },
}

impl ConfigError {
    pub(crate) fn load(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::LoadError {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
