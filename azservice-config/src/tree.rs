//! Section-path navigation over a JSON value tree.
//!
//! Segment matching is ASCII case-insensitive so that `azure:cosmosdb` and
//! `Azure:CosmosDb` address the same section.

use crate::SECTION_SEPARATOR;
use serde_json::{Map, Value};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SECTION_SEPARATOR).map(str::trim).filter(|s| !s.is_empty())
}

fn find_key(map: &Map<String, Value>, segment: &str) -> Option<String> {
    if map.contains_key(segment) {
        return Some(segment.to_string());
    }
    map.keys().find(|k| k.eq_ignore_ascii_case(segment)).cloned()
}

/// Look up the value at `path`.
pub(crate) fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        let map = current.as_object()?;
        let key = find_key(map, segment)?;
        current = map.get(&key)?;
    }
    Some(current)
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Insert `value` at `path`, creating intermediate objects and replacing any
/// scalar that sits where an object is needed.
pub(crate) fn insert_path(root: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let map = ensure_object(current);
        let key = find_key(map, segment).unwrap_or_else(|| segment.to_string());
        current = map.entry(key).or_insert_with(|| Value::Object(Map::new()));
    }

    let map = ensure_object(current);
    let key = find_key(map, last).unwrap_or_else(|| last.to_string());
    map.insert(key, value);
}

/// Deep-merge `overlay` into `base`; objects merge key by key, anything else
/// in the overlay wins.
pub(crate) fn merge(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Object(entries) => {
            let map = ensure_object(base);
            for (key, value) in entries {
                let existing = find_key(map, &key).unwrap_or(key);
                merge(map.entry(existing).or_insert(Value::Null), value);
            }
        }
        other => *base = other,
    }
}
