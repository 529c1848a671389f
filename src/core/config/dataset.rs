//! Configuration types for dataset conversion and reading.

use super::errors::{ConfigError, ConfigValidator};
use crate::core::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE, DEFAULT_IMAGE_SIZE, DEFAULT_NUM_EPOCHS,
    DEFAULT_STRING_LENGTH,
};
use crate::core::errors::OcrResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for reading record files into batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Record files, read in the listed order.
    #[serde(default)]
    pub filenames: Vec<PathBuf>,

    /// Number of passes over the record files. `0` means a single pass.
    #[serde(default = "DatasetConfig::default_num_epochs")]
    pub num_epochs: usize,

    /// Number of records per batch.
    #[serde(default = "DatasetConfig::default_batch_size")]
    pub batch_size: usize,

    /// Shuffle window, in records. `0` or `1` disables shuffling.
    #[serde(default = "DatasetConfig::default_buffer_size")]
    pub buffer_size: usize,

    /// Target `[height, width]` of decoded images.
    #[serde(default = "DatasetConfig::default_image_size")]
    pub image_size: [u32; 2],

    /// Emit NCHW batches instead of NHWC.
    #[serde(default)]
    pub channels_first: bool,

    /// Fixed label length; must match the value used at conversion time.
    #[serde(default = "DatasetConfig::default_string_length")]
    pub string_length: usize,

    /// Seed for the shuffle buffer. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DatasetConfig {
    /// Creates a configuration over the given record files with default settings.
    pub fn new<P: Into<PathBuf>>(filenames: impl IntoIterator<Item = P>) -> Self {
        Self {
            filenames: filenames.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the number of epochs.
    pub fn with_num_epochs(mut self, num_epochs: usize) -> Self {
        self.num_epochs = num_epochs;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the shuffle buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the target image size as `[height, width]`.
    pub fn with_image_size(mut self, image_size: [u32; 2]) -> Self {
        self.image_size = image_size;
        self
    }

    /// Set the channel layout flag.
    pub fn with_channels_first(mut self, channels_first: bool) -> Self {
        self.channels_first = channels_first;
        self
    }

    /// Set the fixed label length.
    pub fn with_string_length(mut self, string_length: usize) -> Self {
        self.string_length = string_length;
        self
    }

    /// Set the shuffle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> OcrResult<Self> {
        Self::from_json_file_with_filenames(path, Vec::new())
    }

    /// Loads a configuration from a JSON file, replacing its file list with
    /// `filenames` unless that is empty. Validation runs after the replacement.
    pub fn from_json_file_with_filenames(
        path: &Path,
        filenames: Vec<PathBuf>,
    ) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        if !filenames.is_empty() {
            config.filenames = filenames;
        }
        config.validate()?;
        Ok(config)
    }

    /// Number of passes the reader performs.
    pub fn effective_epochs(&self) -> usize {
        self.num_epochs.max(1)
    }

    fn default_num_epochs() -> usize {
        DEFAULT_NUM_EPOCHS
    }

    fn default_batch_size() -> usize {
        DEFAULT_BATCH_SIZE
    }

    fn default_buffer_size() -> usize {
        DEFAULT_BUFFER_SIZE
    }

    fn default_image_size() -> [u32; 2] {
        DEFAULT_IMAGE_SIZE
    }

    fn default_string_length() -> usize {
        DEFAULT_STRING_LENGTH
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            filenames: Vec::new(),
            num_epochs: DEFAULT_NUM_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            image_size: DEFAULT_IMAGE_SIZE,
            channels_first: false,
            string_length: DEFAULT_STRING_LENGTH,
            seed: None,
        }
    }
}

impl ConfigValidator for DatasetConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filenames.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "At least one record file is required".to_string(),
            });
        }
        self.validate_batch_size(self.batch_size)?;
        self.validate_string_length(self.string_length)?;
        self.validate_image_dimensions(self.image_size[1], self.image_size[0])?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// What dataset conversion does when one input file cannot be encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first invalid file; nothing is written.
    Abort,
    /// Skip the invalid file, record it in the report and continue.
    #[default]
    Skip,
}

impl std::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(policy: &str) -> Result<Self, Self::Err> {
        match policy.to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(ConfigError::InvalidConfig {
                message: format!("Unknown failure policy '{other}', expected 'abort' or 'skip'"),
            }),
        }
    }
}

/// Configuration for converting a directory of labelled images into a record file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Directory holding files named `<prefix>_<label>.<ext>`.
    pub input_directory: PathBuf,

    /// Record file to create.
    pub output_filename: PathBuf,

    /// Fixed label length.
    #[serde(default = "DatasetConfig::default_string_length")]
    pub string_length: usize,

    /// Handling of files whose label cannot be encoded.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl ConversionConfig {
    /// Creates a conversion configuration with default string length and policy.
    pub fn new(input_directory: impl Into<PathBuf>, output_filename: impl Into<PathBuf>) -> Self {
        Self {
            input_directory: input_directory.into(),
            output_filename: output_filename.into(),
            string_length: DEFAULT_STRING_LENGTH,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Set the fixed label length.
    pub fn with_string_length(mut self, string_length: usize) -> Self {
        self.string_length = string_length;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Loads a conversion configuration from a JSON file.
    ///
    /// The input directory must exist at load time.
    pub fn from_json_file(path: &Path) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self::get_defaults()
    }
}

impl ConfigValidator for ConversionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_string_length(self.string_length)?;
        self.validate_directory(&self.input_directory)?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::new(".", "synth_train.records")
    }
}
