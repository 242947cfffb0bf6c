//! Declarative feature filters
//!
//! A [`FilterSpec`] is an ordered list of clauses combined with AND. Specs
//! are compiled once into a [`CompiledFilter`]; any clause that cannot be
//! understood compiles to a predicate that never matches, so bad input
//! narrows the result instead of failing the view.

mod expression;

use ahash::AHashSet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use mf_core::{Feature, FieldValue};

use crate::analysis::{continuous_value, value_tokens, FieldAnalysis, FieldType};
use crate::config::AnalyzerConfig;

/// Clause type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseKind {
    Discrete,
    Continuous,
    /// Anything else found in the input
    #[serde(other)]
    Unknown,
}

/// Recognized clause operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Value is one of the bounds (discrete)
    In,
    /// Value equals the single bound
    Eq,
    /// Inclusive `[min, max]` (continuous)
    Range,
    Gte,
    Lte,
}

impl FilterOperator {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "in" => Some(FilterOperator::In),
            "eq" | "==" => Some(FilterOperator::Eq),
            "range" | "between" => Some(FilterOperator::Range),
            "gte" | ">=" => Some(FilterOperator::Gte),
            "lte" | "<=" => Some(FilterOperator::Lte),
            _ => None,
        }
    }

    /// Operator assumed when a clause does not name one
    pub fn default_for(kind: ClauseKind) -> Option<Self> {
        match kind {
            ClauseKind::Discrete => Some(FilterOperator::In),
            ClauseKind::Continuous => Some(FilterOperator::Range),
            ClauseKind::Unknown => None,
        }
    }
}

/// A single filter clause
///
/// Deserialization never fails: a clause whose shape cannot be read comes
/// out with [`ClauseKind::Unknown`] and matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterClause {
    pub field: String,

    #[serde(rename = "type")]
    pub kind: ClauseKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Accepted values (discrete) or `[min, max]` (continuous)
    pub bounds: Vec<FieldValue>,
}

impl FilterClause {
    /// Discrete membership clause
    pub fn discrete<V: Into<FieldValue>>(field: impl Into<String>, accepted: impl IntoIterator<Item = V>) -> Self {
        Self {
            field: field.into(),
            kind: ClauseKind::Discrete,
            operator: None,
            bounds: accepted.into_iter().map(Into::into).collect(),
        }
    }

    /// Inclusive continuous range clause
    pub fn range(field: impl Into<String>, min: impl Into<FieldValue>, max: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            kind: ClauseKind::Continuous,
            operator: None,
            bounds: vec![min.into(), max.into()],
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

impl FilterClause {
    /// Read a clause object such as
    /// `{ "field": "today", "type": "continuous", "operator": "gte", "bounds": 6 }`.
    ///
    /// `bound` is accepted for `bounds`, and a single bound may be given
    /// without an array.
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return expression::unreadable("", value.to_string());
        };

        let field = object.get("field").and_then(Value::as_str).unwrap_or_default();
        let kind = object
            .get("type")
            .and_then(|kind| ClauseKind::deserialize(kind).ok())
            .unwrap_or(ClauseKind::Unknown);
        let operator = match object.get("operator") {
            None | Some(Value::Null) => None,
            Some(Value::String(op)) => Some(op.clone()),
            Some(other) => Some(other.to_string()),
        };
        let bounds = match object.get("bounds").or_else(|| object.get("bound")) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().cloned().map(FieldValue::from).collect(),
            Some(single) => vec![FieldValue::from(single.clone())],
        };

        Self {
            field: field.to_string(),
            kind,
            operator,
            bounds,
        }
    }
}

impl<'de> Deserialize<'de> for FilterClause {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| FilterClause::from_json(&value))
    }
}

/// Ordered AND-combined clauses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    pub clauses: Vec<FilterClause>,
}

impl FilterSpec {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Read a legacy filter expression such as
    /// `["all", ["in", "happening", "flood"], [">=", "today", 5]]`
    pub fn from_expression(expression: &Value) -> Self {
        expression::parse(expression)
    }

    /// Compile with the default date formats.
    ///
    /// With an analysis, clauses on fields the analysis has never seen match
    /// nothing, and text values of space-delimited fields are split into
    /// tokens before matching.
    pub fn compile(&self, analysis: Option<&FieldAnalysis>) -> CompiledFilter {
        self.compile_with(analysis, &AnalyzerConfig::default())
    }

    pub fn compile_with(&self, analysis: Option<&FieldAnalysis>, config: &AnalyzerConfig) -> CompiledFilter {
        let clauses: Vec<CompiledClause> = self
            .clauses
            .iter()
            .map(|clause| CompiledClause::compile(clause, analysis, &config.date_formats))
            .collect();

        for clause in &clauses {
            if let Predicate::Never(err) = &clause.predicate {
                tracing::warn!("Filter clause matches nothing: {}", err);
            }
        }

        CompiledFilter {
            clauses,
            date_formats: config.date_formats.clone(),
        }
    }
}

/// Why a clause was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClauseError {
    #[error("malformed clause on '{field}': {reason}")]
    MalformedClause { field: String, reason: String },

    #[error("field '{field}' is not present in the current data")]
    UnknownField { field: String },
}

enum Predicate {
    OneOf {
        texts: AHashSet<String>,
        others: AHashSet<FieldValue>,
        split_text: bool,
    },
    Between {
        min: f64,
        max: f64,
    },
    Never(ClauseError),
}

struct CompiledClause {
    field: String,
    predicate: Predicate,
}

impl CompiledClause {
    fn compile(clause: &FilterClause, analysis: Option<&FieldAnalysis>, date_formats: &[String]) -> Self {
        let predicate = match Self::build(clause, analysis, date_formats) {
            Ok(predicate) => predicate,
            Err(err) => Predicate::Never(err),
        };
        Self {
            field: clause.field.clone(),
            predicate,
        }
    }

    fn build(
        clause: &FilterClause,
        analysis: Option<&FieldAnalysis>,
        date_formats: &[String],
    ) -> Result<Predicate, ClauseError> {
        let malformed = |reason: String| ClauseError::MalformedClause {
            field: clause.field.clone(),
            reason,
        };

        let operator = match &clause.operator {
            Some(op) => FilterOperator::parse(op)
                .ok_or_else(|| malformed(format!("unrecognized operator '{op}'")))?,
            None => FilterOperator::default_for(clause.kind)
                .ok_or_else(|| malformed("unrecognized clause type".to_string()))?,
        };

        let bound = |value: &FieldValue| {
            continuous_value(value, date_formats)
                .ok_or_else(|| malformed(format!("bound '{value}' is not a number or date")))
        };
        let expect_bounds = |n: usize| {
            if clause.bounds.len() == n {
                Ok(())
            } else {
                Err(malformed(format!("expected {n} bound(s), got {}", clause.bounds.len())))
            }
        };

        let predicate = match (clause.kind, operator) {
            (ClauseKind::Unknown, _) => return Err(malformed("unrecognized clause type".to_string())),
            (ClauseKind::Discrete, FilterOperator::In) => {
                if clause.bounds.is_empty() {
                    return Err(malformed("no accepted values".to_string()));
                }
                Self::one_of(&clause.bounds)
            }
            (ClauseKind::Discrete, FilterOperator::Eq) => {
                expect_bounds(1)?;
                Self::one_of(&clause.bounds)
            }
            (ClauseKind::Continuous, FilterOperator::Range) => {
                expect_bounds(2)?;
                Predicate::Between {
                    min: bound(&clause.bounds[0])?,
                    max: bound(&clause.bounds[1])?,
                }
            }
            (ClauseKind::Continuous, FilterOperator::Gte) => {
                expect_bounds(1)?;
                Predicate::Between {
                    min: bound(&clause.bounds[0])?,
                    max: f64::INFINITY,
                }
            }
            (ClauseKind::Continuous, FilterOperator::Lte) => {
                expect_bounds(1)?;
                Predicate::Between {
                    min: f64::NEG_INFINITY,
                    max: bound(&clause.bounds[0])?,
                }
            }
            (ClauseKind::Continuous, FilterOperator::Eq) => {
                expect_bounds(1)?;
                let v = bound(&clause.bounds[0])?;
                Predicate::Between { min: v, max: v }
            }
            (kind, op) => return Err(malformed(format!("operator {op:?} does not apply to {kind:?} clauses"))),
        };

        match (analysis, predicate) {
            (Some(analysis), _) if !analysis.contains(&clause.field) => Err(ClauseError::UnknownField {
                field: clause.field.clone(),
            }),
            (Some(analysis), Predicate::OneOf { texts, others, .. }) => Ok(Predicate::OneOf {
                texts,
                others,
                split_text: analysis.field_type(&clause.field) == Some(FieldType::SpaceDelimited),
            }),
            (_, predicate) => Ok(predicate),
        }
    }

    fn one_of(bounds: &[FieldValue]) -> Predicate {
        let mut texts = AHashSet::new();
        let mut others = AHashSet::new();
        for value in bounds {
            match value {
                FieldValue::Text(s) => {
                    texts.insert(s.clone());
                }
                other => {
                    others.insert(other.clone());
                }
            }
        }
        Predicate::OneOf {
            texts,
            others,
            split_text: false,
        }
    }

    fn matches(&self, feature: &Feature, date_formats: &[String]) -> bool {
        let Some(value) = feature.get(&self.field) else {
            return false;
        };
        match &self.predicate {
            Predicate::Never(_) => false,
            Predicate::Between { min, max } => continuous_value(value, date_formats)
                .map(|v| v >= *min && v <= *max)
                .unwrap_or(false),
            Predicate::OneOf { texts, others, split_text } => match value {
                FieldValue::Null => false,
                FieldValue::Text(s) if !*split_text => texts.contains(s.as_str()),
                FieldValue::Text(_) | FieldValue::List(_) => value_tokens(value, *split_text)
                    .iter()
                    .any(|token| texts.contains(token.as_str())),
                FieldValue::Bool(b) => others.contains(value) || texts.contains(b.to_string().as_str()),
                other => others.contains(other),
            },
        }
    }
}

/// A filter spec ready to evaluate
pub struct CompiledFilter {
    clauses: Vec<CompiledClause>,
    date_formats: Vec<String>,
}

impl CompiledFilter {
    /// Whether a feature passes every clause
    pub fn matches(&self, feature: &Feature) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.matches(feature, &self.date_formats))
    }

    /// Matching features, in input order
    pub fn apply(&self, features: &[Feature]) -> Vec<Feature> {
        features.iter().filter(|f| self.matches(f)).cloned().collect()
    }

    /// Matching features by reference, in input order
    pub fn apply_refs<'a>(&self, features: &'a [Feature]) -> Vec<&'a Feature> {
        features.iter().filter(|f| self.matches(f)).collect()
    }

    /// Errors for the clauses that were rejected at compile time
    pub fn diagnostics(&self) -> Vec<&ClauseError> {
        self.clauses
            .iter()
            .filter_map(|clause| match &clause.predicate {
                Predicate::Never(err) => Some(err),
                _ => None,
            })
            .collect()
    }
}

/// Whether a single feature passes a single clause, reading dates with the
/// default formats
pub fn matches(feature: &Feature, clause: &FilterClause) -> bool {
    let formats = AnalyzerConfig::default_date_formats();
    CompiledClause::compile(clause, None, formats).matches(feature, formats)
}

/// Features that pass every clause of `spec`, in input order
pub fn apply_filter(features: &[Feature], spec: &FilterSpec) -> Vec<Feature> {
    if spec.is_empty() {
        return features.to_vec();
    }
    spec.compile(None).apply(features)
}

/// Like [`apply_filter`], with field types taken from `analysis`
pub fn apply_filter_with(features: &[Feature], spec: &FilterSpec, analysis: &FieldAnalysis) -> Vec<Feature> {
    if spec.is_empty() {
        return features.to_vec();
    }
    spec.compile(Some(analysis)).apply(features)
}
