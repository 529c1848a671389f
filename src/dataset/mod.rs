//! Record datasets: on-disk format, conversion and batched reading.
//!
//! * `record` - Record codec, writer and reader
//! * `convert` - Directory of `<prefix>_<label>.<ext>` images to a record file
//! * `reader` - Shuffled, repeated, batched iteration over record files

pub mod convert;
pub mod reader;
pub mod record;

pub use convert::{ConversionReport, convert_dataset, label_from_filename};
pub use reader::{Batch, Dataset, ShuffleBuffer};
pub use record::{Record, RecordCodec, RecordReader, RecordWriter, read_records};
