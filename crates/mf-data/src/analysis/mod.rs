//! Field analysis: type inference and per-field statistics
//!
//! The analyzer scans a whole feature collection once and classifies every
//! property key. The result is a pure function of the collection: counts
//! drive every classification decision, so the order of features never
//! changes a field's type, only the first-seen order of its distinct values.

mod dates;

pub use dates::parse_date;

use ahash::AHashSet;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use mf_core::{Feature, FieldValue};

use crate::config::AnalyzerConfig;

/// Sub-kind of a continuous field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuousKind {
    Number,
    /// Dates, ranges in epoch milliseconds
    Date,
}

/// Inferred field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Continuous(ContinuousKind),
    Discrete,
    SpaceDelimited,
    Location,
    /// No usable values; reported but not filterable
    Unknown,
}

impl FieldType {
    pub fn is_continuous(&self) -> bool {
        matches!(self, FieldType::Continuous(_))
    }
}

/// Inclusive value range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Range over an iterator of finite values, `None` if it is empty
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |range: Option<ValueRange>, v| {
            Some(match range {
                Some(r) => ValueRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
                None => ValueRange { min: v, max: v },
            })
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Statistics for a single field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStat {
    pub field_type: FieldType,

    /// Distinct values in first-seen order (discrete, space-delimited)
    pub values: IndexSet<FieldValue>,

    /// Min/max for continuous and numeric location fields
    pub range: Option<ValueRange>,

    /// Features that define the field
    pub count: usize,

    /// Features that carry the key with a null-like value
    pub null_count: usize,

    /// Defined values excluded from the range
    pub invalid_count: usize,
}

impl FieldStat {
    fn unknown(null_count: usize, invalid_count: usize, count: usize) -> Self {
        Self {
            field_type: FieldType::Unknown,
            values: IndexSet::new(),
            range: None,
            count,
            null_count,
            invalid_count,
        }
    }

    pub fn is_filterable(&self) -> bool {
        self.field_type != FieldType::Unknown
    }
}

/// Per-field analysis of a feature collection, in first-seen field order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldAnalysis {
    fields: IndexMap<String, FieldStat>,
}

impl FieldAnalysis {
    pub fn get(&self, key: &str) -> Option<&FieldStat> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn field_type(&self, key: &str) -> Option<FieldType> {
        self.fields.get(key).map(|stat| stat.field_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldStat)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields that have data to filter on
    pub fn filterable_fields(&self) -> impl Iterator<Item = (&str, &FieldStat)> {
        self.iter().filter(|(_, stat)| stat.is_filterable())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// How a single defined value looks to the continuous check
enum Reading {
    Number(f64),
    Date(f64),
    /// Numeric type, but not a finite number
    Invalid,
    Other,
}

/// Field analyzer
#[derive(Debug, Clone)]
pub struct FieldAnalyzer {
    config: AnalyzerConfig,
}

impl FieldAnalyzer {
    /// Create an analyzer with the default configuration
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze every field of a feature collection
    pub fn analyze(&self, features: &[Feature]) -> FieldAnalysis {
        let mut defined: IndexMap<&str, Vec<&FieldValue>> = IndexMap::new();
        let mut nulls: IndexMap<&str, usize> = IndexMap::new();

        for feature in features {
            for (key, value) in &feature.properties {
                let values = defined.entry(key.as_str()).or_default();
                if self.config.null_config.is_missing(value) {
                    *nulls.entry(key.as_str()).or_default() += 1;
                } else {
                    values.push(value);
                }
            }
        }

        let fields: IndexMap<String, FieldStat> = defined
            .into_iter()
            .map(|(key, values)| {
                let null_count = nulls.get(key).copied().unwrap_or(0);
                (key.to_string(), self.classify(key, &values, null_count))
            })
            .collect();

        tracing::debug!(
            "Analyzed {} features: {} fields ({} filterable)",
            features.len(),
            fields.len(),
            fields.values().filter(|s| s.is_filterable()).count()
        );

        FieldAnalysis { fields }
    }

    fn read(&self, value: &FieldValue) -> Reading {
        match value {
            FieldValue::Number(n) if n.is_finite() => Reading::Number(*n),
            FieldValue::Number(_) => Reading::Invalid,
            FieldValue::Date(d) => Reading::Date(d.timestamp_millis() as f64),
            FieldValue::Text(s) => {
                if let Some(n) = value.as_number() {
                    Reading::Number(n)
                } else if let Some(d) = parse_date(s, &self.config.date_formats) {
                    Reading::Date(d.timestamp_millis() as f64)
                } else {
                    Reading::Other
                }
            }
            _ => Reading::Other,
        }
    }

    /// Type of one field from its defined values.
    ///
    /// Coordinate keys are checked first, so a numeric `lat` column is
    /// `Location` rather than `Continuous`. Location fields keep a range but
    /// no distinct values, which leaves a color index over them empty.
    /// After that comes continuous (strict majority of numbers or dates),
    /// then space-delimited, then discrete.
    fn classify(&self, key: &str, values: &[&FieldValue], null_count: usize) -> FieldStat {
        let count = values.len();
        if count == 0 {
            return FieldStat::unknown(null_count, 0, 0);
        }

        let readings: Vec<Reading> = values.iter().map(|v| self.read(v)).collect();

        if self.config.is_location_key(key) {
            let numbers: Vec<f64> = readings
                .iter()
                .filter_map(|p| match p {
                    Reading::Number(n) => Some(*n),
                    _ => None,
                })
                .collect();
            return FieldStat {
                field_type: FieldType::Location,
                values: IndexSet::new(),
                range: ValueRange::from_values(numbers.iter().copied()),
                count,
                null_count,
                invalid_count: count - numbers.len(),
            };
        }

        let numbers = readings.iter().filter(|p| matches!(p, Reading::Number(_))).count();
        let dates = readings.iter().filter(|p| matches!(p, Reading::Date(_))).count();
        let invalid = readings.iter().filter(|p| matches!(p, Reading::Invalid)).count();

        if (numbers + dates + invalid) * 2 > count {
            let kind = if dates > numbers {
                ContinuousKind::Date
            } else {
                ContinuousKind::Number
            };
            let valid: Vec<f64> = readings
                .iter()
                .filter_map(|p| match (kind, p) {
                    (ContinuousKind::Number, Reading::Number(n)) => Some(*n),
                    (ContinuousKind::Date, Reading::Date(ms)) => Some(*ms),
                    _ => None,
                })
                .collect();

            let Some(range) = ValueRange::from_values(valid.iter().copied()) else {
                tracing::warn!("Field '{}' has no valid continuous values", key);
                return FieldStat::unknown(null_count, count, count);
            };
            if valid.len() < count {
                tracing::debug!(
                    "Field '{}': {} of {} values excluded from range",
                    key,
                    count - valid.len(),
                    count
                );
            }
            return FieldStat {
                field_type: FieldType::Continuous(kind),
                values: IndexSet::new(),
                range: Some(range),
                count,
                null_count,
                invalid_count: count - valid.len(),
            };
        }

        if let Some(tokens) = self.space_delimited_tokens(values) {
            return FieldStat {
                field_type: FieldType::SpaceDelimited,
                values: tokens,
                range: None,
                count,
                null_count,
                invalid_count: 0,
            };
        }

        FieldStat {
            field_type: FieldType::Discrete,
            values: values.iter().map(|v| (*v).clone()).collect(),
            range: None,
            count,
            null_count,
            invalid_count: 0,
        }
    }

    /// Tokens of a multi-valued field, or `None` if the field is not one.
    ///
    /// Any list value makes the field multi-valued as long as every other
    /// value is text. A text-only field qualifies when some values contain
    /// whitespace, tokens are short, and tokens repeat across values (fewer
    /// distinct tokens than distinct values), which separates tag lists
    /// like `"rain river"` from free text like `"forest fire"`.
    fn space_delimited_tokens(&self, values: &[&FieldValue]) -> Option<IndexSet<FieldValue>> {
        let mut has_list = false;
        let mut has_whitespace = false;
        for value in values {
            match value {
                FieldValue::List(_) => has_list = true,
                FieldValue::Text(s) => {
                    if s.trim().contains(char::is_whitespace) {
                        has_whitespace = true;
                    }
                }
                _ => return None,
            }
        }

        let tokens: IndexSet<FieldValue> = values
            .iter()
            .flat_map(|v| value_tokens(v, true))
            .map(FieldValue::Text)
            .collect();

        if has_list {
            return Some(tokens);
        }
        if !has_whitespace {
            return None;
        }

        let distinct_values: AHashSet<&FieldValue> = values.iter().copied().collect();
        let short_tokens = tokens.iter().all(|t| match t {
            FieldValue::Text(s) => s.chars().count() <= self.config.max_token_len,
            _ => false,
        });
        (short_tokens && tokens.len() < distinct_values.len()).then_some(tokens)
    }
}

impl Default for FieldAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze a collection with the default configuration
pub fn analyze(features: &[Feature]) -> FieldAnalysis {
    FieldAnalyzer::new().analyze(features)
}

/// Individual values of a possibly multi-valued field.
///
/// Lists yield their non-empty items; text is split on whitespace when
/// `split_text` is set and otherwise yields itself.
pub fn value_tokens(value: &FieldValue, split_text: bool) -> Vec<String> {
    match value {
        FieldValue::List(items) => items.iter().filter(|s| !s.is_empty()).cloned().collect(),
        FieldValue::Text(s) if split_text => s.split_whitespace().map(str::to_string).collect(),
        FieldValue::Text(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Numeric position of a value on a continuous axis.
///
/// Numbers (and numeric text) map to themselves, dates and date text to
/// epoch milliseconds. Anything else has no position.
pub fn continuous_value(value: &FieldValue, date_formats: &[String]) -> Option<f64> {
    match value {
        FieldValue::Date(d) => Some(d.timestamp_millis() as f64),
        FieldValue::Text(s) => value
            .as_number()
            .or_else(|| parse_date(s, date_formats).map(|d| d.timestamp_millis() as f64)),
        other => other.as_number(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: &str, props: &[(&str, FieldValue)]) -> Feature {
        props
            .iter()
            .fold(Feature::new(id), |f, (k, v)| f.with_property(*k, v.clone()))
    }

    fn happening() -> Vec<Feature> {
        vec![
            feature("1", &[("happening", "flood".into())]),
            feature("2", &[("happening", "fire".into())]),
            feature("3", &[("happening", "flood".into())]),
        ]
    }

    #[test]
    fn test_empty_collection() {
        assert!(analyze(&[]).is_empty());
    }

    #[test]
    fn test_discrete_values_in_first_seen_order() {
        let analysis = analyze(&happening());
        let stat = analysis.get("happening").unwrap();

        assert_eq!(stat.field_type, FieldType::Discrete);
        let values: Vec<_> = stat.values.iter().cloned().collect();
        assert_eq!(values, vec![FieldValue::from("flood"), FieldValue::from("fire")]);
        assert_eq!(stat.count, 3);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let features = happening();
        assert_eq!(analyze(&features), analyze(&features));
    }

    #[test]
    fn test_classification_ignores_feature_order() {
        let mut features = vec![
            feature("1", &[("today", 5.0.into()), ("tags", vec!["a", "b"].into())]),
            feature("2", &[("today", "bad".into()), ("tags", "b c".into())]),
            feature("3", &[("today", 10.0.into())]),
        ];
        let forward = analyze(&features);
        features.reverse();
        let backward = analyze(&features);

        for (key, stat) in forward.iter() {
            let other = backward.get(key).unwrap();
            assert_eq!(stat.field_type, other.field_type);
            assert_eq!(stat.range, other.range);
            assert_eq!(stat.values, other.values);
        }
    }

    #[test]
    fn test_continuous_ignores_invalid_values() {
        let features = vec![
            feature("1", &[("today", 5.0.into())]),
            feature("2", &[("today", "bad".into())]),
            feature("3", &[("today", 10.0.into())]),
        ];
        let stat = analyze(&features).get("today").cloned().unwrap();

        assert_eq!(stat.field_type, FieldType::Continuous(ContinuousKind::Number));
        assert_eq!(stat.range, Some(ValueRange { min: 5.0, max: 10.0 }));
        assert_eq!(stat.invalid_count, 1);
    }

    #[test]
    fn test_all_null_field_is_unknown() {
        let features = vec![
            feature("1", &[("empty", FieldValue::Null), ("happening", "fire".into())]),
            feature("2", &[("empty", "".into())]),
            feature("3", &[("empty", "N/A".into())]),
        ];
        let analysis = analyze(&features);
        let stat = analysis.get("empty").unwrap();

        assert_eq!(stat.field_type, FieldType::Unknown);
        assert_eq!(stat.null_count, 3);
        assert!(!stat.is_filterable());
        assert_eq!(analysis.filterable_fields().count(), 1);
    }

    #[test]
    fn test_non_finite_numbers_degrade_to_unknown() {
        let features = vec![
            feature("1", &[("reading", f64::NAN.into())]),
            feature("2", &[("reading", f64::INFINITY.into())]),
        ];
        let stat = analyze(&features).get("reading").cloned().unwrap();
        assert_eq!(stat.field_type, FieldType::Unknown);
        assert_eq!(stat.invalid_count, 2);
    }

    #[test]
    fn test_date_field() {
        let features = vec![
            feature("1", &[("date", "2017-03-02".into())]),
            feature("2", &[("date", "2017-03-05T12:00:00Z".into())]),
            feature("3", &[("date", "soon".into())]),
        ];
        let stat = analyze(&features).get("date").cloned().unwrap();
        let first = parse_date("2017-03-02", &AnalyzerConfig::default().date_formats).unwrap();

        assert_eq!(stat.field_type, FieldType::Continuous(ContinuousKind::Date));
        assert_eq!(stat.range.unwrap().min, first.timestamp_millis() as f64);
        assert_eq!(stat.invalid_count, 1);
    }

    #[test]
    fn test_space_delimited_fields() {
        let features = vec![
            feature("1", &[("tags", "rain river".into()), ("impact", vec!["crops"].into())]),
            feature("2", &[("tags", "rain".into()), ("impact", "homes roads".into())]),
            feature("3", &[("tags", "river".into())]),
        ];
        let analysis = analyze(&features);

        let tags = analysis.get("tags").unwrap();
        assert_eq!(tags.field_type, FieldType::SpaceDelimited);
        let tokens: Vec<_> = tags.values.iter().map(|v| v.to_string()).collect();
        assert_eq!(tokens, vec!["rain", "river"]);

        let impact = analysis.get("impact").unwrap();
        assert_eq!(impact.field_type, FieldType::SpaceDelimited);
        assert_eq!(impact.values.len(), 3);
    }

    #[test]
    fn test_free_text_stays_discrete() {
        let features = vec![
            feature("1", &[("happening", "forest fire".into())]),
            feature("2", &[("happening", "flood".into())]),
        ];
        assert_eq!(analyze(&features).field_type("happening"), Some(FieldType::Discrete));
    }

    #[test]
    fn test_location_field() {
        let features = vec![
            feature("1", &[("lat", 2.5.into()), ("gps_lon", (-59.0).into())]),
            feature("2", &[("lat", 3.0.into()), ("gps_lon", (-58.5).into())]),
        ];
        let analysis = analyze(&features);

        assert_eq!(analysis.field_type("lat"), Some(FieldType::Location));
        assert_eq!(analysis.field_type("gps_lon"), Some(FieldType::Location));
        assert_eq!(analysis.get("lat").unwrap().range, Some(ValueRange { min: 2.5, max: 3.0 }));
    }

    #[test]
    fn test_every_key_is_reported() {
        let features = vec![
            feature("1", &[("a", 1.0.into())]),
            feature("2", &[("b", "x".into()), ("c", FieldValue::Null)]),
        ];
        let keys: Vec<_> = analyze(&features).keys().map(str::to_string).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_continuous_value() {
        let formats = AnalyzerConfig::default().date_formats;
        assert_eq!(continuous_value(&FieldValue::Number(4.0), &formats), Some(4.0));
        assert_eq!(continuous_value(&"7".into(), &formats), Some(7.0));
        assert!(continuous_value(&"2017-03-02".into(), &formats).is_some());
        assert_eq!(continuous_value(&"bad".into(), &formats), None);
        assert_eq!(continuous_value(&FieldValue::Null, &formats), None);
    }
}
