//! Field analysis, filtering and data handling for the map filter pipeline

pub mod analysis;
pub mod cache;
pub mod config;
pub mod filter;
pub mod index;
pub mod transform;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use mf_core::{Feature, FeatureCollection};

// Re-exports
pub use analysis::{analyze, ContinuousKind, FieldAnalysis, FieldAnalyzer, FieldStat, FieldType, ValueRange};
pub use cache::{fingerprint, AnalysisCache, SnapshotCache};
pub use config::{AnalyzerConfig, NullConfig};
pub use filter::{apply_filter, apply_filter_with, matches, ClauseError, ClauseKind, CompiledFilter, FilterClause, FilterSpec};
pub use index::FeatureIndex;
pub use transform::untransform;

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate feature id: {0}")]
    DuplicateId(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureInput {
    Collection(FeatureCollection),
    List(Vec<Feature>),
}

/// Read features from a `FeatureCollection` object or a bare array
pub fn features_from_json(value: Value) -> Result<Vec<Feature>, DataError> {
    let input: FeatureInput = serde_json::from_value(value)?;
    Ok(match input {
        FeatureInput::Collection(collection) => collection.features,
        FeatureInput::List(features) => features,
    })
}
