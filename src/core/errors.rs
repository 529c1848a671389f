//! Error types for the synth-ocr crate.
//!
//! This module defines the errors that can occur while encoding labels,
//! reading and writing record files, converting image directories into
//! datasets, and rendering attention visualizations. It also provides
//! helper constructors for building these errors with context.

use std::path::PathBuf;
use thiserror::Error;

/// Enum representing the stage of processing an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingStage {
    /// Error occurred while writing an image directory out as records.
    Conversion,
    /// Error occurred while composing visualization images.
    Visualization,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Conversion => write!(f, "conversion"),
            ProcessingStage::Visualization => write!(f, "visualization"),
        }
    }
}

/// Enum representing the errors that can occur in the crate.
#[derive(Error, Debug)]
pub enum OCRError {
    /// A character outside the alphanumeric alphabet was encoded.
    #[error("invalid character {character:?}: not in the alphanumeric alphabet")]
    InvalidCharacter {
        /// The rejected character.
        character: char,
    },

    /// A class id has no character counterpart (pad sentinel or out of range).
    #[error("invalid class id {class_id}: no character decoding")]
    InvalidClassId {
        /// The rejected class id.
        class_id: i64,
    },

    /// A string does not fit in the fixed label length.
    #[error("label too long: {length} characters exceed string length {max_length}")]
    LabelTooLong {
        /// Number of characters in the string.
        length: usize,
        /// The configured fixed label length.
        max_length: usize,
    },

    /// A stored label length differs from the configured string length.
    #[error("schema mismatch: expected label length {expected}, found {actual}")]
    SchemaMismatch {
        /// The configured string length.
        expected: usize,
        /// The length found in the data.
        actual: usize,
    },

    /// An image referenced by a record or prediction does not exist.
    #[error("image not found: {}", path.display())]
    ImageNotFound {
        /// The missing image path.
        path: PathBuf,
    },

    /// Error occurred while loading or saving an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// A single input file failed to convert into a record.
    #[error("failed to convert '{}'", path.display())]
    Conversion {
        /// The offending input file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: Box<OCRError>,
    },

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from record payload (de)serialization.
    #[error("record serialization")]
    Serialization(#[from] bincode::Error),

    /// Error from JSON (de)serialization.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// Error from array shape operations.
    #[error("tensor shape")]
    Shape(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl OCRError {
    /// Creates an OCRError for processing operations.
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage of processing where the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    pub fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an OCRError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an OCRError for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Wraps an error raised while converting `path` into a record.
    pub fn conversion(path: impl Into<PathBuf>, error: OCRError) -> Self {
        Self::Conversion {
            path: path.into(),
            source: Box::new(error),
        }
    }

    /// Creates an OCRError for validation errors.
    ///
    /// # Arguments
    ///
    /// * `component` - The component where the error occurred.
    /// * `field` - The field where the error occurred.
    /// * `expected` - The expected value.
    /// * `actual` - The actual value.
    pub fn validation_error(component: &str, field: &str, expected: &str, actual: &str) -> Self {
        Self::InvalidInput {
            message: format!(
                "Validation failed in {}: field '{}' expected {}, but got '{}'",
                component, field, expected, actual
            ),
        }
    }

    /// Returns the innermost error, looking through `Conversion` wrappers.
    pub fn root_cause(&self) -> &OCRError {
        match self {
            Self::Conversion { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Implementation of From<image::ImageError> for OCRError.
impl From<image::ImageError> for OCRError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

/// Implementation of From<crate::core::config::ConfigError> for OCRError.
impl From<crate::core::config::ConfigError> for OCRError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

/// Convenient result alias for crate operations.
pub type OcrResult<T> = Result<T, OCRError>;
