//! Conversion of a directory of labelled images into a record file.
//!
//! Every input file is named `<prefix>_<label>.<ext>`; the label string is
//! validated against the alphabet and encoded to a fixed-length label.

use super::record::RecordWriter;
use crate::core::config::{ConfigValidatorExt, ConversionConfig, FailurePolicy};
use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;
use crate::core::errors::{OCRError, OcrResult, ProcessingStage};
use crate::processors::codec::{Label, build_label};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a dataset conversion.
#[derive(Debug)]
pub struct ConversionReport {
    /// The record file that was written.
    pub output_filename: PathBuf,
    /// Number of records written.
    pub written: usize,
    /// Files that were skipped, each wrapped in `OCRError::Conversion`.
    pub skipped: Vec<OCRError>,
}

/// Extracts the label string from a `<prefix>_<label>.<ext>` file name.
///
/// The label is the segment between the first and second `_` of the file stem.
///
/// # Errors
///
/// Returns `OCRError::InvalidInput` if the stem has no `_` separator or is not UTF-8.
pub fn label_string_from_filename(path: &Path) -> OcrResult<&str> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| OCRError::invalid_input("file name is missing or not UTF-8"))?;

    stem.split('_').nth(1).ok_or_else(|| {
        OCRError::invalid_input(format!(
            "file name '{stem}' does not follow <prefix>_<label>.<ext>"
        ))
    })
}

/// Parses and encodes the label embedded in `path`.
pub fn label_from_filename(path: &Path, string_length: usize) -> OcrResult<Label> {
    build_label(label_string_from_filename(path)?, string_length)
}

/// Lists regular files of `directory` in sorted order.
fn list_input_files(directory: &Path) -> OcrResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Converts every file of the input directory into one record file.
///
/// Input files are processed in sorted file-name order, which is also the
/// order of the written records. Labels are parsed in parallel.
///
/// # Errors
///
/// * Configuration errors if the string length is zero or the directory is missing.
/// * With `FailurePolicy::Abort`, the first invalid file's `OCRError::Conversion`;
///   no output file is created in that case.
/// * `OCRError::Processing` if the output file cannot be created.
/// * IO and serialization errors while writing the output.
pub fn convert_dataset(config: &ConversionConfig) -> OcrResult<ConversionReport> {
    let config = config.clone().validate_and_wrap_ocr_error()?;
    let files = list_input_files(&config.input_directory)?;
    let string_length = config.string_length;

    info!(
        "Converting {} files from {} (string length {})",
        files.len(),
        config.input_directory.display(),
        string_length
    );

    let encode = |path: PathBuf| -> (PathBuf, OcrResult<(String, Label)>) {
        let result = path
            .to_str()
            .ok_or_else(|| OCRError::invalid_input("image path is not UTF-8"))
            .and_then(|image_ref| {
                let label = label_from_filename(&path, string_length)?;
                Ok((image_ref.to_string(), label))
            });
        (path, result)
    };

    let mut parsed: Vec<(PathBuf, OcrResult<(String, Label)>)> =
        if files.len() > DEFAULT_PARALLEL_THRESHOLD {
            files.into_par_iter().map(encode).collect()
        } else {
            files.into_iter().map(encode).collect()
        };

    if config.failure_policy == FailurePolicy::Abort
        && let Some(index) = parsed.iter().position(|(_, r)| r.is_err())
        && let (path, Err(e)) = parsed.swap_remove(index)
    {
        return Err(OCRError::conversion(path, e));
    }

    let mut writer =
        RecordWriter::create(&config.output_filename, string_length).map_err(|e| {
            OCRError::processing_error(
                ProcessingStage::Conversion,
                &format!("create {}", config.output_filename.display()),
                e,
            )
        })?;
    let mut skipped = Vec::new();

    for (path, result) in parsed {
        match result {
            Ok((image_ref, label)) => {
                writer.write_record(&image_ref, &label)?;
                debug!("Wrote record for {}", image_ref);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                skipped.push(OCRError::conversion(path, e));
            }
        }
    }

    let written = writer.written();
    writer.finish()?;

    info!(
        "Wrote {} records to {} ({} skipped)",
        written,
        config.output_filename.display(),
        skipped.len()
    );

    Ok(ConversionReport {
        output_filename: config.output_filename,
        written,
        skipped,
    })
}
