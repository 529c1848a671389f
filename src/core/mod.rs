//! The core module of the crate.
//!
//! This module contains the fundamental pieces shared by every component:
//! - Configuration management
//! - Constants used throughout the crate
//! - Error handling
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod config;
pub mod constants;
pub mod errors;

pub use crate::utils::init_tracing;
pub use config::{
    ConfigError, ConfigValidator, ConfigValidatorExt, ConversionConfig, DatasetConfig,
    FailurePolicy,
};
pub use constants::*;
pub use errors::{OCRError, OcrResult, ProcessingStage};
