//! Record identity, version tokens and field maps.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Field name to value map of a stored record.
pub type Fields = serde_json::Map<String, Value>;

/// Opaque version token assigned by the store on every write.
///
/// Only ever compared for equality. The wildcard [`ETag::any`] matches every
/// stored version and turns a conditional write into an unconditional one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    const ANY: &'static str = "*";

    /// Wrap a token produced by a store.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Wildcard token that matches any stored version.
    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    /// Whether this is the wildcard token.
    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    /// Whether a write guarded by `self` may replace a record currently at
    /// `stored`.
    pub fn matches(&self, stored: &ETag) -> bool {
        self.is_any() || self == stored
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partition key value.
///
/// Only the value kinds a partition key can hold are representable: strings,
/// booleans and integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartitionKey {
    Bool(bool),
    Int(i64),
    String(String),
}

impl PartitionKey {
    /// Interpret a JSON value as a partition key; `None` for floats, nulls,
    /// arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// JSON form of the key, as stored in the record's partition key field.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for PartitionKey {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PartitionKey {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

/// Identity of a record within one container or table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub partition_key: PartitionKey,
    pub id: String,
}

impl RecordKey {
    pub fn new(partition_key: impl Into<PartitionKey>, id: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.id)
    }
}

/// A record as read from a store, together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord {
    pub key: RecordKey,
    pub etag: ETag,
    pub fields: Fields,
}

impl VersionedRecord {
    /// Value of a single field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize the fields into a typed entity.
    ///
    /// Fields that do not fit `T` fail with [`StoreError::Serialization`](crate::StoreError::Serialization).
    pub fn to_entity<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}
