//! Batched, shuffled reading of record files.
//!
//! Records are streamed from the configured files in order, repeated for the
//! configured number of epochs, passed through a bounded shuffle buffer, and
//! grouped into batches whose images are decoded in parallel.

use super::record::{Record, RecordReader};
use crate::core::config::{ConfigValidatorExt, DatasetConfig};
use crate::core::errors::{OCRError, OcrResult};
use crate::processors::types::ChannelOrder;
use crate::utils::image::{load_images_f32_with_threshold, resize_f32, rgb32f_to_array};
use ndarray::{Array2, Array3, Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, warn};

type RecordStream = Box<dyn Iterator<Item = OcrResult<Record>> + Send>;

/// One batch of decoded examples.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Image references, in batch order.
    pub image_refs: Vec<String>,
    /// Images in `[0, 1]`, shaped NHWC or NCHW.
    pub images: Array4<f32>,
    /// Labels shaped `(batch, string_length)`.
    pub labels: Array2<i32>,
}

impl Batch {
    /// Number of examples in the batch.
    pub fn len(&self) -> usize {
        self.image_refs.len()
    }

    /// Returns true if the batch holds no examples.
    pub fn is_empty(&self) -> bool {
        self.image_refs.is_empty()
    }
}

/// Randomizes item order with a bounded window, like a streaming shuffle.
///
/// The buffer is filled to `capacity` items; each output is drawn uniformly
/// from the buffer and replaced by the next source item.
pub struct ShuffleBuffer<I: Iterator> {
    source: I,
    buffer: Vec<I::Item>,
    capacity: usize,
    rng: StdRng,
    exhausted: bool,
}

impl<I: Iterator> ShuffleBuffer<I> {
    /// Wraps `source`; a capacity of 0 or 1 keeps the source order.
    pub fn new(source: I, capacity: usize, rng: StdRng) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            capacity,
            rng,
            exhausted: false,
        }
    }
}

impl<I: Iterator> Iterator for ShuffleBuffer<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.capacity <= 1 {
            return self.source.next();
        }

        while !self.exhausted && self.buffer.len() < self.capacity {
            match self.source.next() {
                Some(item) => self.buffer.push(item),
                None => self.exhausted = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.buffer.len());
        Some(self.buffer.swap_remove(index))
    }
}

fn record_stream(filenames: Vec<PathBuf>, epochs: usize, string_length: usize) -> RecordStream {
    Box::new((0..epochs).flat_map(move |epoch| {
        debug!("Starting epoch {}", epoch);
        filenames
            .clone()
            .into_iter()
            .flat_map(move |path| -> RecordStream {
                match RecordReader::open(&path, string_length) {
                    Ok(reader) => Box::new(reader),
                    Err(e) => Box::new(std::iter::once(Err(e))),
                }
            })
    }))
}

/// Iterator over batches of a record dataset.
///
/// A record that fails to parse is yielded as an error on its own; records
/// gathered for the current batch are kept for the next call.
pub struct Dataset {
    records: ShuffleBuffer<RecordStream>,
    pending: Vec<Record>,
    batch_size: usize,
    image_size: [u32; 2],
    order: ChannelOrder,
    string_length: usize,
}

impl Dataset {
    /// Creates a dataset reader from a validated configuration.
    pub fn new(config: DatasetConfig) -> OcrResult<Self> {
        let config = config.validate_and_wrap_ocr_error()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let stream = record_stream(
            config.filenames.clone(),
            config.effective_epochs(),
            config.string_length,
        );

        Ok(Self {
            records: ShuffleBuffer::new(stream, config.buffer_size, rng),
            pending: Vec::with_capacity(config.batch_size),
            batch_size: config.batch_size,
            image_size: config.image_size,
            order: ChannelOrder::from_channels_first(config.channels_first),
            string_length: config.string_length,
        })
    }

    fn assemble(&self, records: Vec<Record>) -> OcrResult<Batch> {
        let image_size = self.image_size;
        let order = self.order;
        let [height, width] = image_size;
        let paths: Vec<&str> = records.iter().map(|r| r.image_ref.as_str()).collect();
        let images = load_images_f32_with_threshold(&paths, None)?;

        let arrays: Vec<Array3<f32>> = images
            .par_iter()
            .map(|img| rgb32f_to_array(&resize_f32(img, image_size), order))
            .collect();

        let (h, w) = (height as usize, width as usize);
        let shape = match order {
            ChannelOrder::HWC => (records.len(), h, w, 3),
            ChannelOrder::CHW => (records.len(), 3, h, w),
        };
        let mut batch_images = Array4::<f32>::zeros(shape);
        for (i, array) in arrays.iter().enumerate() {
            batch_images.index_axis_mut(Axis(0), i).assign(array);
        }

        let mut labels = Array2::<i32>::zeros((records.len(), self.string_length));
        for (i, record) in records.iter().enumerate() {
            for (j, &id) in record.label.ids().iter().enumerate() {
                labels[[i, j]] = i32::try_from(id)
                    .map_err(|_| OCRError::InvalidClassId { class_id: id })?;
            }
        }

        Ok(Batch {
            image_refs: records.into_iter().map(|r| r.image_ref).collect(),
            images: batch_images,
            labels,
        })
    }
}

impl Iterator for Dataset {
    type Item = OcrResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.len() < self.batch_size {
            match self.records.next() {
                Some(Ok(record)) => self.pending.push(record),
                Some(Err(e)) => {
                    warn!("Dropping unreadable record: {}", e);
                    return Some(Err(e));
                }
                None => break,
            }
        }

        if self.pending.is_empty() {
            return None;
        }
        let records = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        debug!("Assembling batch of {} records", records.len());
        Some(self.assemble(records))
    }
}
