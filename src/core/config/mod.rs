//! Configuration management for dataset conversion, reading and visualization.
//!
//! This module provides configuration types and validation traits.

pub mod dataset;
pub mod errors;

// Re-export commonly used types
pub use dataset::{ConversionConfig, DatasetConfig, FailurePolicy};
pub use errors::{ConfigError, ConfigValidator, ConfigValidatorExt};
