//! View models for the map filter pipeline
//!
//! Views share one [`Pipeline`] and read its immutable snapshots. Each view
//! keeps its own [`mf_core::ViewState`] for hidden fields and selection.

pub mod colors;
pub mod feature_detail;
pub mod field_mapping;
pub mod media;
pub mod pipeline;

pub use colors::{build_index, categorical_color, color_hex, marker_label, ColorIndex, LegendEntry, DEFAULT_PALETTE, UNKNOWN_COLOR};
pub use feature_detail::{DetailField, DetailRow, FeatureDetail};
pub use field_mapping::FieldMapping;
pub use media::{media_items, media_url, GridLayout, MediaItem, MediaSize, DEFAULT_THUMB_SIZE};
pub use pipeline::{Pipeline, PipelineConfig, PipelineSnapshot};
