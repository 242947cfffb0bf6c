//! Converting edited features back to their stored shape
//!
//! Loading normalizes features (nested objects flattened into dotted keys,
//! multi-valued text read as token lists). Before an edited feature is
//! handed back to storage those steps are undone.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use mf_core::{Feature, FieldValue};

use crate::analysis::{FieldAnalysis, FieldType};
use crate::DataError;

/// Stored JSON form of an edited feature
pub fn untransform(feature: &Feature, analysis: &FieldAnalysis) -> Result<Value, DataError> {
    let properties: IndexMap<String, Value> = feature
        .properties
        .iter()
        .map(|(key, value)| {
            let value = match (value, analysis.field_type(key)) {
                (FieldValue::List(items), Some(FieldType::SpaceDelimited)) => Value::String(items.join(" ")),
                (FieldValue::Text(s), _) => Value::String(s.trim().to_string()),
                (other, _) => Value::from(other.clone()),
            };
            (key.clone(), value)
        })
        .collect();

    Ok(json!({
        "type": "Feature",
        "id": feature.id,
        "geometry": serde_json::to_value(&feature.geometry)?,
        "properties": unflatten(properties),
    }))
}

/// Rebuild nested objects from dotted keys.
///
/// A dotted key whose path is already taken by a non-object value is kept
/// as a flat key.
pub fn unflatten(properties: IndexMap<String, Value>) -> Map<String, Value> {
    let mut root = Map::new();
    for (key, value) in properties {
        let parts: Vec<&str> = key.split('.').collect();
        let nestable = parts.len() > 1 && parts.iter().all(|p| !p.is_empty());
        match parts.split_last() {
            Some((last, parents)) if nestable && path_is_free(&root, parents) => {
                if let Some(target) = descend(&mut root, parents) {
                    target.insert(last.to_string(), value);
                }
            }
            _ => {
                root.insert(key, value);
            }
        }
    }
    root
}

fn path_is_free(map: &Map<String, Value>, parts: &[&str]) -> bool {
    match parts.split_first() {
        None => true,
        Some((first, rest)) => match map.get(*first) {
            None => true,
            Some(Value::Object(inner)) => path_is_free(inner, rest),
            Some(_) => false,
        },
    }
}

fn descend<'a>(map: &'a mut Map<String, Value>, parts: &[&str]) -> Option<&'a mut Map<String, Value>> {
    match parts.split_first() {
        None => Some(map),
        Some((first, rest)) => {
            let entry = map
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            descend(entry.as_object_mut()?, rest)
        }
    }
}
