//! # Synth OCR
//!
//! Data plumbing for an attention-based recognizer trained on synthetic word
//! images, where every image file name carries its ground-truth text.
//!
//! ## Features
//!
//! - Fixed 62-character alphanumeric codec with a padding sentinel class
//! - Conversion of `<prefix>_<label>.<ext>` image directories into record files
//! - Shuffled, repeated, batched reading of record files into tensors
//! - Attention map normalization, resizing and bounding-box extraction
//! - Composite visualizations of per-timestep attention (feature `visualization`)
//!
//! ## Modules
//!
//! * [`core`] - Configuration, constants and error handling
//! * [`dataset`] - Record format, conversion and batched reading
//! * [`processors`] - Label codec and attention map processing
//! * [`utils`] - Image helpers, visualization and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use synth_ocr::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = convert_dataset(&ConversionConfig::new("data/synth", "synth.records"))?;
//! println!("{} records written", report.written);
//!
//! let config = DatasetConfig::new(["synth.records"]).with_batch_size(32);
//! for batch in Dataset::new(config)? {
//!     let batch = batch?;
//!     println!("{:?} {:?}", batch.images.dim(), batch.labels.dim());
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod dataset;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use synth_ocr::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        ConversionConfig, DatasetConfig, FailurePolicy, OCRError, OcrResult, init_tracing,
    };
    pub use crate::dataset::{Batch, Dataset, Record, convert_dataset};
    pub use crate::processors::{
        AttentionMapProcessor, BoundingBox, CharacterClassCodec, Label, build_label, decode_label,
    };

    #[cfg(feature = "visualization")]
    pub use crate::utils::visualization::{
        InferenceSample, SampleImage, VisualizationComposer, VisualizationConfig, Visualizer,
    };
}
