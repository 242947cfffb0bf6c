//! Analyzer configuration module

pub mod analyzer_config;
pub mod null_handling;

pub use analyzer_config::*;
pub use null_handling::*;
