//! Field mutations applied by an optimistic patch.
//!
//! A mutation is either a literal value or a function of the record as it
//! was freshly read on the current attempt. Computed mutations are evaluated
//! again on every attempt, so a retried patch never writes a value derived
//! from a stale read.

use crate::error::{Result, StoreError};
use crate::record::Fields;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type ComputeFn = dyn Fn(&Fields) -> std::result::Result<Value, String> + Send + Sync;

/// New value for a single field.
#[derive(Clone)]
pub enum FieldMutation {
    /// Write this value as-is.
    Set(Value),
    /// Derive the value from the current record.
    Compute(Arc<ComputeFn>),
}

impl FieldMutation {
    pub fn set(value: impl Into<Value>) -> Self {
        Self::Set(value.into())
    }

    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(&Fields) -> Value + Send + Sync + 'static,
    {
        Self::Compute(Arc::new(move |current| Ok(f(current))))
    }

    /// Computed mutation that can reject the current record.
    pub fn try_compute<F>(f: F) -> Self
    where
        F: Fn(&Fields) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Self::Compute(Arc::new(f))
    }

    /// Resolve to a concrete value against `current`.
    pub fn resolve(&self, field: &str, current: &Fields) -> Result<Value> {
        match self {
            Self::Set(value) => Ok(value.clone()),
            Self::Compute(f) => f(current).map_err(|message| StoreError::Mutation {
                field: field.to_string(),
                message,
            }),
        }
    }
}

impl fmt::Debug for FieldMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(value) => f.debug_tuple("Set").field(value).finish(),
            Self::Compute(_) => f.write_str("Compute(<fn>)"),
        }
    }
}

/// Ordered batch of field mutations.
///
/// Every entry is resolved against the same snapshot; a later entry for the
/// same field replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct Mutations {
    entries: Vec<(String, FieldMutation)>,
}

impl Mutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal values for every field of `fields`.
    pub fn from_fields(fields: Fields) -> Self {
        Self {
            entries: fields
                .into_iter()
                .map(|(field, value)| (field, FieldMutation::Set(value)))
                .collect(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, FieldMutation::set(value));
        self
    }

    pub fn compute<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Fields) -> Value + Send + Sync + 'static,
    {
        self.push(field, FieldMutation::compute(f));
        self
    }

    pub fn try_compute<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Fields) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.push(field, FieldMutation::try_compute(f));
        self
    }

    /// Add `delta` to an integer field; a missing field counts as zero.
    pub fn increment(self, field: impl Into<String>, delta: i64) -> Self {
        let field = field.into();
        let source = field.clone();
        self.try_compute(field, move |current| match current.get(&source) {
            None | Some(Value::Null) => Ok(Value::from(delta)),
            Some(value) => value
                .as_i64()
                .and_then(|n| n.checked_add(delta))
                .map(Value::from)
                .ok_or_else(|| format!("cannot add {} to {}", delta, value)),
        })
    }

    pub fn push(&mut self, field: impl Into<String>, mutation: FieldMutation) {
        self.entries.push((field.into(), mutation));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Names of the mutated fields, in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(field, _)| field.as_str())
    }

    /// Resolve every mutation against the same `current` snapshot.
    pub fn resolve(&self, current: &Fields) -> Result<Fields> {
        let mut resolved = Fields::new();
        for (field, mutation) in &self.entries {
            resolved.insert(field.clone(), mutation.resolve(field, current)?);
        }
        Ok(resolved)
    }
}
