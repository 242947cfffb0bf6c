//! Core data model for the map filter pipeline
//!
//! This crate provides the feature model shared by every stage, the
//! per-view state transitions, and the plumbing that lets views react to
//! new inputs.

pub mod events;
pub mod feature;
pub mod state;
pub mod sync;

// Re-export commonly used types
pub use events::{EventBus, Event, EventHandler, handler_from_fn};
pub use feature::{Feature, FeatureCollection, FeatureId, FieldValue, Geometry, Properties};
pub use state::{BulkAction, FieldRow, ViewState};
pub use sync::{ViewId, ViewRegistry};
