//! Constants used throughout the crate.
//!
//! This module defines default values shared by the dataset, conversion and
//! visualization configurations, along with the fixed alphabet layout.

/// Number of alphanumeric symbols in the alphabet (`0-9`, `A-Z`, `a-z`).
pub const ALPHABET_SIZE: usize = 62;

/// Class id reserved for padding; one past the last alphanumeric id.
pub const PAD_CLASS_ID: i64 = ALPHABET_SIZE as i64;

/// Number of classes predicted by the decoder, including the pad sentinel.
pub const NUM_CLASSES: usize = ALPHABET_SIZE + 1;

/// The default fixed label length.
pub const DEFAULT_STRING_LENGTH: usize = 10;

/// The default target image size as `[height, width]`.
pub const DEFAULT_IMAGE_SIZE: [u32; 2] = [256, 256];

/// The default batch size for reading datasets.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// The default shuffle window, in records.
pub const DEFAULT_BUFFER_SIZE: usize = 7_000_000;

/// The default number of passes over the record files.
pub const DEFAULT_NUM_EPOCHS: usize = 1;

/// The default attention threshold used to derive bounding boxes.
pub const DEFAULT_BBOX_THRESHOLD: f32 = 0.5;

/// The default number of predictions rendered per visualization run.
pub const DEFAULT_VISUALIZE_LIMIT: usize = 10;

/// The default directory visualization artifacts are written to.
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "outputs/synth";

/// The separator placed between decoded predictions in artifact names.
pub const PREDICTION_SEPARATOR: &str = "_";

/// The default threshold for parallel processing.
///
/// This constant defines the minimum number of items that need
/// to be processed before parallel processing is used.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;
