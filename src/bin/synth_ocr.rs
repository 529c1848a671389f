//! Synth OCR command-line tool
//!
//! Converts labelled image directories into record files, inspects and batches
//! record files, and renders attention visualizations from saved predictions.
//!
//! # Usage
//!
//! ```bash
//! synth-ocr convert data/synth/train -o synth_train.records
//! synth-ocr inspect synth_train.records --limit 5
//! synth-ocr batches synth_train.records --batch-size 32 --max-batches 2
//! synth-ocr visualize predictions.json -o outputs/synth
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) to see progress logs.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use synth_ocr::core::config::ConfigValidator;
use synth_ocr::core::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BBOX_THRESHOLD, DEFAULT_BUFFER_SIZE, DEFAULT_OUTPUT_DIRECTORY,
    DEFAULT_STRING_LENGTH, DEFAULT_VISUALIZE_LIMIT,
};
use synth_ocr::core::{ConversionConfig, DatasetConfig, FailurePolicy, init_tracing};
use synth_ocr::dataset::{Dataset, RecordReader, convert_dataset};
use synth_ocr::utils::visualization::{VisualizationConfig, Visualizer, load_predictions};
use tracing::{error, info, warn};

/// Command-line arguments for the synth-ocr tool
#[derive(Parser)]
#[command(name = "synth-ocr")]
#[command(about = "Record datasets and attention visualization for synthetic text recognition")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a directory of `<prefix>_<label>.<ext>` images into a record file
    Convert(ConvertArgs),
    /// Print the records stored in record files
    Inspect(InspectArgs),
    /// Read shuffled batches from record files and print their shapes
    Batches(BatchesArgs),
    /// Render attention map and bounding box composites from a predictions file
    Visualize(VisualizeArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Directory holding the labelled images
    input_dir: PathBuf,

    /// Record file to write
    #[arg(short, long, default_value = "synth_train.records")]
    output: PathBuf,

    /// Fixed label length
    #[arg(long, default_value_t = DEFAULT_STRING_LENGTH)]
    string_length: usize,

    /// What to do with files whose label cannot be encoded (skip or abort)
    #[arg(long, default_value = "skip")]
    on_error: FailurePolicy,
}

#[derive(Args)]
struct InspectArgs {
    /// Record files to read, in order
    #[arg(required = true)]
    record_files: Vec<PathBuf>,

    /// Fixed label length the file was written with
    #[arg(long, default_value_t = DEFAULT_STRING_LENGTH)]
    string_length: usize,

    /// Maximum number of records to print per file
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct BatchesArgs {
    /// Record files to read, in order; required unless the configuration lists them
    record_files: Vec<PathBuf>,

    /// Optional JSON dataset configuration; command-line files replace its file list
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of records per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Shuffle window in records
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Number of passes over the files
    #[arg(long, default_value = "1")]
    num_epochs: usize,

    /// Image height
    #[arg(long, default_value = "256")]
    height: u32,

    /// Image width
    #[arg(long, default_value = "256")]
    width: u32,

    /// Emit NCHW instead of NHWC batches
    #[arg(long)]
    channels_first: bool,

    /// Fixed label length
    #[arg(long, default_value_t = DEFAULT_STRING_LENGTH)]
    string_length: usize,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many batches
    #[arg(long)]
    max_batches: Option<usize>,
}

#[derive(Args)]
struct VisualizeArgs {
    /// JSON file of `{ image_path, attention_maps, predictions }` entries
    predictions: PathBuf,

    /// Optional JSON visualization configuration; overrides the options below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to write artifacts to
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIRECTORY)]
    output_dir: PathBuf,

    /// Number of predictions to render
    #[arg(long, default_value_t = DEFAULT_VISUALIZE_LIMIT)]
    limit: usize,

    /// Attention threshold for bounding boxes
    #[arg(long, default_value_t = DEFAULT_BBOX_THRESHOLD)]
    threshold: f32,

    /// Cell height
    #[arg(long, default_value = "256")]
    height: u32,

    /// Cell width
    #[arg(long, default_value = "256")]
    width: u32,

    /// Artifact file extension
    #[arg(long, default_value = "jpg")]
    extension: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Convert(args) => convert(args),
        Command::Inspect(args) => inspect(args),
        Command::Batches(args) => batches(args),
        Command::Visualize(args) => visualize(args),
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn convert(args: ConvertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConversionConfig::new(&args.input_dir, &args.output)
        .with_string_length(args.string_length)
        .with_failure_policy(args.on_error);

    let report = convert_dataset(&config)?;
    for skipped in &report.skipped {
        warn!("{}: {}", skipped, skipped.root_cause());
    }
    info!(
        "{} records written to {}, {} files skipped",
        report.written,
        report.output_filename.display(),
        report.skipped.len()
    );
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    for record_file in &args.record_files {
        let reader = RecordReader::open(record_file, args.string_length)?;
        let mut count = 0;
        for record in reader.take(args.limit.unwrap_or(usize::MAX)) {
            let record = record?;
            println!("{}\t{}\t{:?}", record.image_ref, record.text()?, record.label.ids());
            count += 1;
        }
        info!("{} records read from {}", count, record_file.display());
    }
    Ok(())
}

fn batches(args: BatchesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            DatasetConfig::from_json_file_with_filenames(path, args.record_files.clone())?
        }
        None => DatasetConfig::new(args.record_files.clone())
            .with_batch_size(args.batch_size)
            .with_buffer_size(args.buffer_size)
            .with_num_epochs(args.num_epochs)
            .with_image_size([args.height, args.width])
            .with_channels_first(args.channels_first)
            .with_string_length(args.string_length),
    };
    let config = match args.seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    };

    let mut emitted = 0;
    for batch in Dataset::new(config)?.take(args.max_batches.unwrap_or(usize::MAX)) {
        match batch {
            Ok(batch) => {
                println!(
                    "batch {}: images {:?}, labels {:?}",
                    emitted,
                    batch.images.shape(),
                    batch.labels.shape()
                );
                emitted += 1;
            }
            Err(e) => warn!("Skipping record: {}", e),
        }
    }
    info!("{} batches read", emitted);
    Ok(())
}

fn visualize(args: VisualizeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => VisualizationConfig::from_json_file(path)?,
        None => {
            let config = VisualizationConfig::default()
                .with_output_directory(&args.output_dir)
                .with_limit(args.limit)
                .with_threshold(args.threshold)
                .with_image_size([args.height, args.width])
                .with_extension(args.extension);
            config.validate()?;
            config
        }
    };

    let samples = load_predictions(&args.predictions)?;
    info!("Loaded {} predictions", samples.len());

    let mut visualizer = Visualizer::new(config)?;
    let report = visualizer.run(samples)?;
    for path in &report.written {
        println!("{}", path.display());
    }
    Ok(())
}
