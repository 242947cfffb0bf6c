//! Pipeline owning the latest inputs and the snapshots derived from them
//!
//! Every input (collection, filter, color field, edit) replaces the previous
//! one and produces a new [`PipelineSnapshot`]. Snapshots are shared as
//! `Arc`s and never change, so a view can keep rendering an old one while a
//! newer one is built.

use std::sync::Arc;

use egui::Color32;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mf_core::events::events::{CollectionLoaded, ColorFieldChanged, FeatureEdited, FilterChanged};
use mf_core::{EventBus, Feature, ViewState};
use mf_data::{
    fingerprint, untransform, AnalysisCache, AnalyzerConfig, ClauseError, DataError, FeatureIndex, FieldAnalysis,
    FieldAnalyzer, FilterSpec, SnapshotCache,
};

use crate::colors::ColorIndex;
use crate::feature_detail::FeatureDetail;
use crate::field_mapping::FieldMapping;
use crate::media::{media_items, MediaItem};

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub analyzer: AnalyzerConfig,

    /// Snapshots kept per cache
    pub cache_capacity: usize,

    /// RGB palette for the color index; empty means the default palette
    pub palette: Vec<[u8; 3]>,

    pub color_field: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            cache_capacity: 8,
            palette: Vec::new(),
            color_field: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON, filling in defaults
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.cache_capacity == 0 {
            return Err(DataError::Config("cache_capacity must be at least 1".to_string()));
        }
        self.analyzer.validate()
    }

    pub fn palette_colors(&self) -> Vec<Color32> {
        self.palette
            .iter()
            .map(|[r, g, b]| Color32::from_rgb(*r, *g, *b))
            .collect()
    }
}

/// Everything derived from one set of inputs
#[derive(Debug)]
pub struct PipelineSnapshot {
    pub features: Arc<Vec<Feature>>,
    pub fingerprint: u64,
    pub analysis: Arc<FieldAnalysis>,
    pub filter: FilterSpec,
    /// Features passing the filter, in collection order
    pub filtered: Vec<Feature>,
    /// Filter clauses that were rejected and match nothing
    pub rejected: Vec<ClauseError>,
    pub color_index: Arc<ColorIndex>,
    pub index: FeatureIndex,
}

impl PipelineSnapshot {
    fn empty() -> Self {
        Self {
            features: Arc::new(Vec::new()),
            fingerprint: 0,
            analysis: Arc::new(FieldAnalysis::default()),
            filter: FilterSpec::default(),
            filtered: Vec::new(),
            rejected: Vec::new(),
            color_index: Arc::new(ColorIndex::empty()),
            index: FeatureIndex::default(),
        }
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.index.get(&self.features, id)
    }

    /// Detail card for a feature of the collection
    pub fn detail(&self, id: &str, mapping: &FieldMapping, view: &ViewState) -> Option<FeatureDetail> {
        let feature = self.feature(id)?;
        Some(FeatureDetail::build(feature, &self.analysis, &self.color_index, mapping, view))
    }

    /// Media of the filtered features
    pub fn media(&self, mapping: &FieldMapping) -> Vec<MediaItem> {
        media_items(&self.filtered, mapping)
    }

    /// Field mapping guessed from this snapshot's analysis
    pub fn guess_mapping(&self) -> FieldMapping {
        FieldMapping::guess(&self.analysis, self.color_index.field())
    }
}

#[derive(Default)]
struct Inputs {
    features: Arc<Vec<Feature>>,
    fingerprint: u64,
    filter: FilterSpec,
    color_field: Option<String>,
}

struct PipelineState {
    inputs: Inputs,
    snapshot: Arc<PipelineSnapshot>,
}

/// Owner of the latest inputs and their derived snapshot
pub struct Pipeline {
    analyzer: FieldAnalyzer,
    palette: Vec<Color32>,
    state: RwLock<PipelineState>,
    analyses: AnalysisCache,
    colors: SnapshotCache<(u64, Option<String>), ColorIndex>,
    events: EventBus,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let inputs = Inputs {
            fingerprint: fingerprint(&[]),
            color_field: config.color_field.clone(),
            ..Default::default()
        };

        let mut pipeline = Self {
            analyzer: FieldAnalyzer::with_config(config.analyzer.clone()),
            palette: config.palette_colors(),
            state: RwLock::new(PipelineState {
                inputs: Inputs::default(),
                snapshot: Arc::new(PipelineSnapshot::empty()),
            }),
            analyses: AnalysisCache::new(config.cache_capacity),
            colors: SnapshotCache::new(config.cache_capacity),
            events: EventBus::new(),
        };

        let snapshot = pipeline.derive(&inputs, FeatureIndex::default());
        let state = pipeline.state.get_mut();
        state.inputs = inputs;
        state.snapshot = Arc::new(snapshot);
        pipeline
    }

    /// Event bus for pipeline events
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<PipelineSnapshot> {
        self.state.read().snapshot.clone()
    }

    /// Replace the feature collection. Feature ids must be unique.
    pub fn load_features(&self, features: Vec<Feature>) -> Result<Arc<PipelineSnapshot>, DataError> {
        let index = FeatureIndex::build(&features)?;
        let fingerprint = fingerprint(&features);

        let snapshot = {
            let mut state = self.state.write();
            state.inputs.features = Arc::new(features);
            state.inputs.fingerprint = fingerprint;
            self.replace_snapshot(&mut state, index)
        };

        tracing::info!(
            "Loaded {} features with {} fields",
            snapshot.features.len(),
            snapshot.analysis.len()
        );
        self.events.publish(CollectionLoaded {
            feature_count: snapshot.features.len(),
            field_count: snapshot.analysis.len(),
            fingerprint,
        });
        Ok(snapshot)
    }

    /// Replace the filter
    pub fn set_filter(&self, filter: FilterSpec) -> Arc<PipelineSnapshot> {
        let snapshot = {
            let mut state = self.state.write();
            state.inputs.filter = filter;
            let index = state.snapshot.index.clone();
            self.replace_snapshot(&mut state, index)
        };

        tracing::info!(
            "Filter with {} clauses matched {} of {} features",
            snapshot.filter.len(),
            snapshot.filtered.len(),
            snapshot.features.len()
        );
        self.events.publish(FilterChanged {
            clause_count: snapshot.filter.len(),
            matched_count: snapshot.filtered.len(),
        });
        snapshot
    }

    /// Replace the color field
    pub fn set_color_field(&self, field: Option<String>) -> Arc<PipelineSnapshot> {
        let snapshot = {
            let mut state = self.state.write();
            state.inputs.color_field = field.clone();
            let index = state.snapshot.index.clone();
            self.replace_snapshot(&mut state, index)
        };

        self.events.publish(ColorFieldChanged { field });
        snapshot
    }

    /// Replace a feature by id with an edited copy
    pub fn edit_feature(&self, feature: Feature) -> Result<Arc<PipelineSnapshot>, DataError> {
        let feature_id = feature.id.clone();
        let snapshot = {
            let mut state = self.state.write();
            let position = state
                .snapshot
                .index
                .position(&feature.id)
                .ok_or_else(|| DataError::FeatureNotFound(feature.id.clone()))?;

            let mut features = state.inputs.features.as_ref().clone();
            features[position] = feature;
            state.inputs.fingerprint = fingerprint(&features);
            state.inputs.features = Arc::new(features);

            let index = state.snapshot.index.clone();
            self.replace_snapshot(&mut state, index)
        };

        tracing::info!("Edited feature {}", feature_id);
        self.events.publish(FeatureEdited { feature_id });
        Ok(snapshot)
    }

    /// Stored JSON form of a feature in the current collection
    pub fn stored_feature(&self, id: &str) -> Result<Value, DataError> {
        let snapshot = self.snapshot();
        let feature = snapshot
            .feature(id)
            .ok_or_else(|| DataError::FeatureNotFound(id.to_string()))?;
        untransform(feature, &snapshot.analysis)
    }

    fn replace_snapshot(&self, state: &mut PipelineState, index: FeatureIndex) -> Arc<PipelineSnapshot> {
        let snapshot = Arc::new(self.derive(&state.inputs, index));
        state.snapshot = snapshot.clone();
        snapshot
    }

    fn derive(&self, inputs: &Inputs, index: FeatureIndex) -> PipelineSnapshot {
        let analysis = self
            .analyses
            .get_or_insert_with(inputs.fingerprint, || self.analyzer.analyze(&inputs.features));

        let color_index = self
            .colors
            .get_or_insert_with((inputs.fingerprint, inputs.color_field.clone()), || {
                ColorIndex::build(
                    &analysis,
                    inputs.color_field.as_deref(),
                    &self.palette,
                    self.analyzer.config(),
                )
            });

        let compiled = inputs.filter.compile_with(Some(analysis.as_ref()), self.analyzer.config());
        let rejected: Vec<ClauseError> = compiled.diagnostics().into_iter().cloned().collect();
        let filtered = compiled.apply(&inputs.features);

        PipelineSnapshot {
            features: inputs.features.clone(),
            fingerprint: inputs.fingerprint,
            analysis,
            filter: inputs.filter.clone(),
            filtered,
            rejected,
            color_index,
            index,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
