//! Feature data model
//!
//! Features arrive from the surrounding application as already-parsed JSON
//! records. Property values are normalized into a closed set of cases
//! ([`FieldValue`]) so the analysis and filter stages never have to guess at
//! runtime shapes.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Stable feature identifier
pub type FeatureId = String;

/// Ordered property mapping of a feature
pub type Properties = IndexMap<String, FieldValue>;

/// A single property value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum FieldValue {
    /// Missing or explicit null
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    /// Multi-valued field, e.g. a tag list
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Numeric view of the value. Numeric text counts, non-finite numbers don't.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in log messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::Date(_) => "date",
            FieldValue::List(_) => "list",
        }
    }
}

fn number_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

/// Whole numbers small enough to survive an `i64` round trip
fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() < 1e15
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Number(a), FieldValue::Number(b)) => number_bits(*a) == number_bits(*b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            (FieldValue::List(a), FieldValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FieldValue::Null => {}
            FieldValue::Bool(b) => b.hash(state),
            FieldValue::Number(n) => number_bits(*n).hash(state),
            FieldValue::Text(s) => s.hash(state),
            FieldValue::Date(d) => d.timestamp_millis().hash(state),
            FieldValue::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Number(n) if is_integral(*n) => write!(f, "{}", *n as i64),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Date(d) => f.write_str(&d.to_rfc3339()),
            FieldValue::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null),
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => FieldValue::List(
                items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            // Nested objects are flattened at the feature level; one that
            // slips through is kept as its JSON text.
            Value::Object(map) => FieldValue::Text(Value::Object(map).to_string()),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Number(n) if is_integral(n) => Value::from(n as i64),
            FieldValue::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s),
            FieldValue::Date(d) => Value::String(d.to_rfc3339()),
            FieldValue::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(items: Vec<&str>) -> Self {
        FieldValue::List(items.into_iter().map(str::to_string).collect())
    }
}

/// Point geometry in GeoJSON axis order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
}

impl Geometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        Geometry::Point { coordinates: [lon, lat] }
    }

    pub fn lon(&self) -> f64 {
        match self {
            Geometry::Point { coordinates } => coordinates[0],
        }
    }

    pub fn lat(&self) -> f64 {
        match self {
            Geometry::Point { coordinates } => coordinates[1],
        }
    }

    /// Read a GeoJSON geometry object. Only points are understood; an
    /// altitude component is dropped.
    pub fn from_geojson(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.get("type")?.as_str()? != "Point" {
            return None;
        }
        let coordinates = object.get("coordinates")?.as_array()?;
        let lon = coordinates.first()?.as_f64()?;
        let lat = coordinates.get(1)?.as_f64()?;
        Some(Geometry::point(lon, lat))
    }
}

impl Hash for Geometry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Geometry::Point { coordinates } => {
                number_bits(coordinates[0]).hash(state);
                number_bits(coordinates[1]).hash(state);
            }
        }
    }
}

/// A geotagged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: FeatureId,

    #[serde(default, deserialize_with = "deserialize_geometry", skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,

    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            properties: IndexMap::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Value for a field, `None` when the feature does not define it
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.properties.get(key)
    }

    /// Value for a field, or `Null` when absent
    pub fn value(&self, key: &str) -> &FieldValue {
        static NULL: FieldValue = FieldValue::Null;
        self.properties.get(key).unwrap_or(&NULL)
    }

    /// Copy of this feature with one property replaced
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.clone().with_property(key, value)
    }
}

impl Hash for Feature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.geometry.hash(state);
        self.properties.len().hash(state);
        for (key, value) in &self.properties {
            key.hash(state);
            value.hash(state);
        }
    }
}

/// GeoJSON-style wrapper around a list of features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

/// Flatten a JSON property object into dotted keys (`{"a": {"b": 1}}` becomes `a.b`)
pub fn flatten_properties(map: Map<String, Value>) -> Properties {
    let mut properties = IndexMap::new();
    flatten_into(&mut properties, None, map);
    properties
}

fn flatten_into(out: &mut Properties, prefix: Option<&str>, map: Map<String, Value>) {
    for (key, value) in map {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        match value {
            Value::Object(nested) => flatten_into(out, Some(&key), nested),
            other => {
                out.insert(key, FieldValue::from(other));
            }
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<FeatureId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "feature id must be a string or number, got {other}"
        ))),
    }
}

fn deserialize_geometry<'de, D>(deserializer: D) -> Result<Option<Geometry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Geometry::from_geojson))
}

fn deserialize_properties<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Map<String, Value>>::deserialize(deserializer)?;
    Ok(raw.map(flatten_properties).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_from_geojson() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "id": 7,
            "geometry": { "type": "Point", "coordinates": [-59.48, 2.63, 120.0] },
            "properties": {
                "happening": "flood",
                "today": 5,
                "tags": ["rain", "river"],
                "impacts": { "people": 12, "crops": null },
                "verified": true
            }
        }))
        .unwrap();

        assert_eq!(feature.id, "7");
        assert_eq!(feature.geometry, Some(Geometry::point(-59.48, 2.63)));
        assert_eq!(feature.value("happening"), &FieldValue::from("flood"));
        assert_eq!(feature.value("today"), &FieldValue::Number(5.0));
        assert_eq!(feature.value("tags"), &FieldValue::from(vec!["rain", "river"]));
        assert_eq!(feature.value("impacts.people"), &FieldValue::Number(12.0));
        assert!(feature.value("impacts.crops").is_null());
        assert_eq!(feature.value("verified"), &FieldValue::Bool(true));

        let keys: Vec<_> = feature.properties.keys().cloned().collect();
        assert_eq!(keys, vec!["happening", "today", "tags", "impacts.people", "impacts.crops", "verified"]);
    }

    #[test]
    fn test_unsupported_geometry_is_dropped() {
        let feature: Feature = serde_json::from_value(json!({
            "id": "a",
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
            "properties": null
        }))
        .unwrap();

        assert!(feature.geometry.is_none());
        assert!(feature.properties.is_empty());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let result = serde_json::from_value::<Feature>(json!({ "properties": {} }));
        assert!(result.is_err());
    }

    #[test]
    fn test_value_equality_and_display() {
        assert_eq!(FieldValue::Number(0.0), FieldValue::Number(-0.0));
        assert_ne!(FieldValue::Number(1.0), FieldValue::from("1"));
        assert_eq!(FieldValue::Number(3.0).to_string(), "3");
        assert_eq!(FieldValue::Number(2.5).to_string(), "2.5");
        assert_eq!(FieldValue::from(vec!["a", "b"]).to_string(), "a b");
        assert_eq!(FieldValue::from(" 12 ").as_number(), Some(12.0));
        assert_eq!(FieldValue::Number(f64::INFINITY).as_number(), None);
    }

    #[test]
    fn test_values_keep_json_types() {
        assert_eq!(Value::from(FieldValue::Number(3.0)), json!(3));
        assert_eq!(Value::from(FieldValue::Number(-0.5)), json!(-0.5));
        assert_eq!(Value::from(FieldValue::from(json!(true))), json!(true));
        assert_eq!(FieldValue::from(false).to_string(), "false");
        assert_ne!(FieldValue::from(true), FieldValue::from("true"));
    }

    #[test]
    fn test_with_value_leaves_original_untouched() {
        let original = Feature::new("1").with_property("happening", "fire");
        let edited = original.with_value("happening", "flood");

        assert_eq!(original.value("happening"), &FieldValue::from("fire"));
        assert_eq!(edited.value("happening"), &FieldValue::from("flood"));
        assert_eq!(edited.id, original.id);
    }
}
