//! Visualization of decoder attention.
//!
//! For every visualized prediction this module renders two composite images:
//! one overlaying each timestep's attention map onto the input image, and one
//! outlining the bounding box derived from that map. Cells are tiled with one
//! row per predicted sequence and one column per decoding timestep.
//!
//! All composition happens on float images in `[0, 1]`; conversion to 8-bit
//! only happens when an artifact is written.
//!
//! # Examples
//!
//! ```rust,no_run
//! use synth_ocr::utils::visualization::{Visualizer, VisualizationConfig, load_predictions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let samples = load_predictions(Path::new("predictions.json"))?;
//! let mut visualizer = Visualizer::new(VisualizationConfig::default())?;
//! let report = visualizer.run(samples)?;
//! println!("wrote {} files", report.written.len());
//! # Ok(())
//! # }
//! ```

use crate::core::config::{ConfigError, ConfigValidator, ConfigValidatorExt};
use crate::core::constants::{
    DEFAULT_BBOX_THRESHOLD, DEFAULT_IMAGE_SIZE, DEFAULT_OUTPUT_DIRECTORY, DEFAULT_VISUALIZE_LIMIT,
    PREDICTION_SEPARATOR,
};
use crate::core::errors::{OCRError, OcrResult, ProcessingStage};
use crate::processors::attention::{AttentionMapProcessor, BoundingBox, ProcessedAttention};
use crate::processors::codec::decode_label;
use crate::processors::types::ChannelOrder;
use crate::utils::image::{array_to_rgb32f, load_image_f32, resize_f32, rgb32f_to_rgb8};

use image::{Rgb, Rgb32FImage, imageops};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use ndarray::{Array2, Array4, ArrayView2, ArrayView3, ArrayView4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BBOX_COLOR: [f32; 3] = [1.0, 0.0, 0.0];

/// Configuration for attention visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// `[height, width]` every cell is rendered at.
    #[serde(default = "VisualizationConfig::default_image_size")]
    pub image_size: [u32; 2],

    /// Attention threshold for bounding boxes.
    #[serde(default = "VisualizationConfig::default_threshold")]
    pub threshold: f32,

    /// Color channel the attention intensity is added to. Defaults to 0 (red).
    #[serde(default)]
    pub overlay_channel: usize,

    /// Outline color in `[0, 1]` RGB.
    #[serde(default = "VisualizationConfig::default_bbox_color")]
    pub bbox_color: [f32; 3],

    /// The thickness of bounding box lines. Defaults to 2.
    #[serde(default = "VisualizationConfig::default_bbox_thickness")]
    pub bbox_thickness: i32,

    /// Directory artifacts are written to.
    #[serde(default = "VisualizationConfig::default_output_directory")]
    pub output_directory: PathBuf,

    /// Artifact file extension, which selects the encoder.
    #[serde(default = "VisualizationConfig::default_extension")]
    pub extension: String,

    /// Maximum number of predictions rendered per run.
    #[serde(default = "VisualizationConfig::default_limit")]
    pub limit: usize,

    /// Separator between decoded sequences in artifact names.
    #[serde(default = "VisualizationConfig::default_separator")]
    pub separator: String,
}

impl VisualizationConfig {
    /// Loads a visualization configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the output directory.
    pub fn with_output_directory(mut self, output_directory: impl Into<PathBuf>) -> Self {
        self.output_directory = output_directory.into();
        self
    }

    /// Set the cell size as `[height, width]`.
    pub fn with_image_size(mut self, image_size: [u32; 2]) -> Self {
        self.image_size = image_size;
        self
    }

    /// Set the bounding box threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the number of predictions rendered per run.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the artifact extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn default_image_size() -> [u32; 2] {
        DEFAULT_IMAGE_SIZE
    }

    fn default_threshold() -> f32 {
        DEFAULT_BBOX_THRESHOLD
    }

    fn default_bbox_color() -> [f32; 3] {
        BBOX_COLOR
    }

    fn default_bbox_thickness() -> i32 {
        2
    }

    fn default_output_directory() -> PathBuf {
        PathBuf::from(DEFAULT_OUTPUT_DIRECTORY)
    }

    fn default_extension() -> String {
        "jpg".to_string()
    }

    fn default_limit() -> usize {
        DEFAULT_VISUALIZE_LIMIT
    }

    fn default_separator() -> String {
        PREDICTION_SEPARATOR.to_string()
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            threshold: DEFAULT_BBOX_THRESHOLD,
            overlay_channel: 0,
            bbox_color: BBOX_COLOR,
            bbox_thickness: 2,
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            extension: "jpg".to_string(),
            limit: DEFAULT_VISUALIZE_LIMIT,
            separator: PREDICTION_SEPARATOR.to_string(),
        }
    }
}

impl ConfigValidator for VisualizationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_image_dimensions(self.image_size[1], self.image_size[0])?;
        self.validate_threshold(self.threshold)?;
        if self.overlay_channel > 2 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "overlay channel must be 0, 1 or 2, got {}",
                    self.overlay_channel
                ),
            });
        }
        if self.bbox_thickness < 1 {
            return Err(ConfigError::InvalidConfig {
                message: "bounding box thickness must be at least 1".to_string(),
            });
        }
        if self.extension.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "artifact extension must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Per-(sequence, timestep) processed attention, preallocated from the map tensor shape.
#[derive(Debug, Clone)]
pub struct AttentionGrid {
    rows: usize,
    timesteps: usize,
    cells: Vec<ProcessedAttention>,
}

impl AttentionGrid {
    /// Processes raw maps shaped `(rows, timesteps, height, width)`.
    pub fn from_raw(maps: ArrayView4<'_, f32>, processor: &AttentionMapProcessor) -> OcrResult<Self> {
        let (rows, timesteps, _, _) = maps.dim();
        let mut cells = Vec::with_capacity(rows * timesteps);
        for row in maps.outer_iter() {
            for map in row.outer_iter() {
                cells.push(processor.process(map)?);
            }
        }
        Ok(Self {
            rows,
            timesteps,
            cells,
        })
    }

    /// Number of rows (predicted sequences).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of decoding timesteps.
    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    /// The cell at `(row, timestep)`, if in range.
    pub fn get(&self, row: usize, timestep: usize) -> Option<&ProcessedAttention> {
        if row >= self.rows || timestep >= self.timesteps {
            return None;
        }
        self.cells.get(row * self.timesteps + timestep)
    }

    /// Bounding boxes indexed by `(row, timestep)`.
    pub fn boxes(&self) -> Array2<Option<BoundingBox>> {
        Array2::from_shape_fn((self.rows, self.timesteps), |(r, t)| {
            self.cells[r * self.timesteps + t].bbox
        })
    }
}

/// A composite image preallocated for a fixed grid of equally sized cells.
struct TileGrid {
    canvas: Rgb32FImage,
    rows: usize,
    cols: usize,
    cell_width: u32,
    cell_height: u32,
}

impl TileGrid {
    fn new(rows: usize, cols: usize, cell_width: u32, cell_height: u32) -> OcrResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(OCRError::invalid_input(format!(
                "cannot tile an empty {rows}x{cols} grid"
            )));
        }
        let width = u32::try_from(cols)
            .ok()
            .and_then(|c| c.checked_mul(cell_width))
            .ok_or_else(|| OCRError::invalid_input("composite image too wide"))?;
        let height = u32::try_from(rows)
            .ok()
            .and_then(|r| r.checked_mul(cell_height))
            .ok_or_else(|| OCRError::invalid_input("composite image too tall"))?;

        Ok(Self {
            canvas: Rgb32FImage::new(width, height),
            rows,
            cols,
            cell_width,
            cell_height,
        })
    }

    fn place(&mut self, row: usize, col: usize, cell: &Rgb32FImage) -> OcrResult<()> {
        if row >= self.rows || col >= self.cols {
            return Err(OCRError::invalid_input(format!(
                "cell ({row}, {col}) outside {}x{} grid",
                self.rows, self.cols
            )));
        }
        if cell.dimensions() != (self.cell_width, self.cell_height) {
            return Err(OCRError::validation_error(
                "TileGrid",
                "cell size",
                &format!("{}x{}", self.cell_width, self.cell_height),
                &format!("{}x{}", cell.width(), cell.height()),
            ));
        }
        let x = col as i64 * self.cell_width as i64;
        let y = row as i64 * self.cell_height as i64;
        imageops::replace(&mut self.canvas, cell, x, y);
        Ok(())
    }

    fn into_image(self) -> Rgb32FImage {
        self.canvas
    }
}

/// Adds `map` into `channel` of a copy of `base`. Values are not clamped.
pub fn overlay_attention(
    base: &Rgb32FImage,
    map: ArrayView2<'_, f32>,
    channel: usize,
) -> OcrResult<Rgb32FImage> {
    let (width, height) = base.dimensions();
    if map.dim() != (height as usize, width as usize) {
        return Err(OCRError::validation_error(
            "overlay_attention",
            "map size",
            &format!("{}x{}", height, width),
            &format!("{}x{}", map.nrows(), map.ncols()),
        ));
    }
    if channel > 2 {
        return Err(OCRError::invalid_input(format!("no color channel {channel}")));
    }

    let mut cell = base.clone();
    for (x, y, pixel) in cell.enumerate_pixels_mut() {
        pixel[channel] += map[[y as usize, x as usize]];
    }
    Ok(cell)
}

/// Outlines `bbox` on a copy of `base`; `None` leaves the copy untouched.
///
/// Thicker outlines grow outwards from the box edge and are clipped to the image.
pub fn draw_bounding_box(
    base: &Rgb32FImage,
    bbox: Option<&BoundingBox>,
    color: [f32; 3],
    thickness: i32,
) -> Rgb32FImage {
    let mut cell = base.clone();
    let Some(bbox) = bbox else {
        return cell;
    };

    for t in 0..thickness.max(1) {
        let rect = Rect::at(bbox.left as i32 - t, bbox.top as i32 - t).of_size(
            bbox.width() as u32 + 2 * t as u32,
            bbox.height() as u32 + 2 * t as u32,
        );
        draw_hollow_rect_mut(&mut cell, rect, Rgb(color));
    }
    cell
}

/// Decodes predicted label sequences and joins them into an artifact base name.
///
/// File-system-unsafe characters cannot occur since decoded text is alphanumeric.
pub fn predictions_to_filename<L: AsRef<[i64]>>(
    label_sequences: &[L],
    separator: &str,
) -> OcrResult<String> {
    let decoded = label_sequences
        .iter()
        .map(|ids| decode_label(ids.as_ref()))
        .collect::<OcrResult<Vec<String>>>()?;
    Ok(decoded.join(separator))
}

/// Tiles attention overlays and bounding boxes into composite images.
#[derive(Debug, Clone)]
pub struct VisualizationComposer {
    config: VisualizationConfig,
    processor: AttentionMapProcessor,
}

impl VisualizationComposer {
    /// Creates a composer from a validated configuration.
    pub fn new(config: VisualizationConfig) -> OcrResult<Self> {
        let config = config.validate_and_wrap_ocr_error()?;
        let [height, width] = config.image_size;
        let processor =
            AttentionMapProcessor::new((height as usize, width as usize), config.threshold)?;
        Ok(Self { config, processor })
    }

    /// The active configuration.
    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Normalizes, resizes and thresholds raw maps shaped `(rows, timesteps, h, w)`.
    pub fn process(&self, maps: ArrayView4<'_, f32>) -> OcrResult<AttentionGrid> {
        AttentionGrid::from_raw(maps, &self.processor)
    }

    /// Resizes base images to the cell size.
    fn prepare_bases(&self, base_images: &[Rgb32FImage], rows: usize) -> OcrResult<Vec<Rgb32FImage>> {
        if base_images.len() != rows && base_images.len() != 1 {
            return Err(OCRError::validation_error(
                "VisualizationComposer",
                "base images",
                &format!("1 or {rows}"),
                &base_images.len().to_string(),
            ));
        }
        Ok(base_images
            .iter()
            .map(|img| resize_f32(img, self.config.image_size))
            .collect())
    }

    fn base_for<'a>(bases: &'a [Rgb32FImage], row: usize) -> &'a Rgb32FImage {
        &bases[row.min(bases.len() - 1)]
    }

    /// Overlays each cell's attention onto its row's base image and tiles the cells.
    ///
    /// `base_images` holds one image per row, or a single image shared by all rows.
    /// The result is `rows * height` by `timesteps * width`.
    pub fn compose_overlay(
        &self,
        base_images: &[Rgb32FImage],
        grid: &AttentionGrid,
    ) -> OcrResult<Rgb32FImage> {
        let bases = self.prepare_bases(base_images, grid.rows())?;
        let [height, width] = self.config.image_size;
        let mut tiles = TileGrid::new(grid.rows(), grid.timesteps(), width, height)?;

        for row in 0..grid.rows() {
            let base = Self::base_for(&bases, row);
            for t in 0..grid.timesteps() {
                let cell = grid.get(row, t).ok_or_else(|| {
                    OCRError::invalid_input(format!("missing attention cell ({row}, {t})"))
                })?;
                let overlay = overlay_attention(base, cell.map.view(), self.config.overlay_channel)
                    .map_err(|e| {
                        OCRError::processing_error(
                            ProcessingStage::Visualization,
                            &format!("overlay of cell ({row}, {t})"),
                            e,
                        )
                    })?;
                tiles.place(row, t, &overlay)?;
            }
        }
        Ok(tiles.into_image())
    }

    /// Outlines each cell's bounding box on its row's base image and tiles the cells.
    ///
    /// `boxes` is indexed by `(row, timestep)`; `None` cells show the plain image.
    pub fn compose_bounding_box_overlay(
        &self,
        base_images: &[Rgb32FImage],
        boxes: ArrayView2<'_, Option<BoundingBox>>,
    ) -> OcrResult<Rgb32FImage> {
        let (rows, timesteps) = boxes.dim();
        let bases = self.prepare_bases(base_images, rows)?;
        let [height, width] = self.config.image_size;
        let mut tiles = TileGrid::new(rows, timesteps, width, height)?;

        for ((row, t), bbox) in boxes.indexed_iter() {
            let base = Self::base_for(&bases, row);
            let cell = draw_bounding_box(
                base,
                bbox.as_ref(),
                self.config.bbox_color,
                self.config.bbox_thickness,
            );
            tiles.place(row, t, &cell)?;
        }
        Ok(tiles.into_image())
    }
}

/// Where a sample's input image comes from.
#[derive(Debug, Clone)]
pub enum SampleImage {
    /// An image file on disk.
    Path(PathBuf),
    /// Float pixels already in memory.
    Pixels(Rgb32FImage),
}

impl SampleImage {
    /// Wraps a float array in the given layout.
    pub fn from_array(array: ArrayView3<'_, f32>, order: ChannelOrder) -> OcrResult<Self> {
        Ok(Self::Pixels(array_to_rgb32f(array, order)?))
    }

    fn load(&self) -> OcrResult<Rgb32FImage> {
        match self {
            SampleImage::Path(path) => load_image_f32(path),
            SampleImage::Pixels(pixels) => Ok(pixels.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            SampleImage::Path(path) => path.display().to_string(),
            SampleImage::Pixels(p) => format!("<{}x{} pixels>", p.width(), p.height()),
        }
    }
}

/// One inference result to visualize.
#[derive(Debug, Clone)]
pub struct InferenceSample {
    /// The input image.
    pub image: SampleImage,
    /// Raw attention maps shaped `(sequences, timesteps, height, width)`.
    pub attention_maps: Array4<f32>,
    /// Predicted class-id sequences, one per row.
    pub predictions: Vec<Vec<i64>>,
}

#[derive(Deserialize)]
struct PredictionEntry {
    image_path: PathBuf,
    attention_maps: Vec<Vec<Vec<Vec<f32>>>>,
    predictions: Vec<Vec<i64>>,
}

impl PredictionEntry {
    fn into_sample(self) -> OcrResult<InferenceSample> {
        let rows = self.attention_maps.len();
        let timesteps = self.attention_maps.first().map_or(0, Vec::len);
        let height = self
            .attention_maps
            .first()
            .and_then(|r| r.first())
            .map_or(0, Vec::len);
        let width = self
            .attention_maps
            .first()
            .and_then(|r| r.first())
            .and_then(|m| m.first())
            .map_or(0, Vec::len);

        for (row, maps) in self.attention_maps.iter().enumerate() {
            if maps.len() != timesteps {
                return Err(OCRError::validation_error(
                    "attention_maps",
                    &format!("row {row} timesteps"),
                    &timesteps.to_string(),
                    &maps.len().to_string(),
                ));
            }
            for (t, map) in maps.iter().enumerate() {
                if map.len() != height {
                    return Err(OCRError::validation_error(
                        "attention_maps",
                        &format!("map ({row}, {t}) height"),
                        &height.to_string(),
                        &map.len().to_string(),
                    ));
                }
                if let Some(line) = map.iter().find(|line| line.len() != width) {
                    return Err(OCRError::validation_error(
                        "attention_maps",
                        &format!("map ({row}, {t}) width"),
                        &width.to_string(),
                        &line.len().to_string(),
                    ));
                }
            }
        }

        let flat: Vec<f32> = self
            .attention_maps
            .into_iter()
            .flatten()
            .flatten()
            .flatten()
            .collect();
        let attention_maps = Array4::from_shape_vec((rows, timesteps, height, width), flat)?;

        Ok(InferenceSample {
            image: SampleImage::Path(self.image_path),
            attention_maps,
            predictions: self.predictions,
        })
    }
}

/// Loads inference samples from a JSON array of
/// `{ "image_path", "attention_maps", "predictions" }` objects.
pub fn load_predictions(path: &Path) -> OcrResult<Vec<InferenceSample>> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<PredictionEntry> = serde_json::from_str(&content)?;
    entries.into_iter().map(PredictionEntry::into_sample).collect()
}

/// Hands out artifact base names, suffixing repeats within one run.
#[derive(Debug, Default)]
pub struct ArtifactNamer {
    seen: HashMap<String, usize>,
}

impl ArtifactNamer {
    /// Returns `base` the first time, then `base_1`, `base_2`, ...
    pub fn unique(&mut self, base: &str) -> String {
        let count = self.seen.entry(base.to_string()).or_insert(0);
        let name = if *count == 0 {
            base.to_string()
        } else {
            format!("{base}_{count}")
        };
        *count += 1;
        name
    }
}

/// Files written and samples skipped by one visualization run.
#[derive(Debug, Default)]
pub struct VisualizationReport {
    /// Artifact files written, attention map first for each sample.
    pub written: Vec<PathBuf>,
    /// Samples that were skipped, with the reason.
    pub skipped: Vec<(String, OCRError)>,
}

/// Renders and saves attention artifacts for a bounded slice of predictions.
pub struct Visualizer {
    composer: VisualizationComposer,
    namer: ArtifactNamer,
}

impl Visualizer {
    /// Creates a visualizer from a validated configuration.
    pub fn new(config: VisualizationConfig) -> OcrResult<Self> {
        Ok(Self {
            composer: VisualizationComposer::new(config)?,
            namer: ArtifactNamer::default(),
        })
    }

    /// The underlying composer.
    pub fn composer(&self) -> &VisualizationComposer {
        &self.composer
    }

    /// Renders up to `limit` samples.
    ///
    /// A sample whose image file is missing, or that carries no sequences or
    /// no timesteps, is logged and skipped; other errors abort the run.
    pub fn run(
        &mut self,
        samples: impl IntoIterator<Item = InferenceSample>,
    ) -> OcrResult<VisualizationReport> {
        let config = self.composer.config().clone();
        std::fs::create_dir_all(&config.output_directory)?;

        let mut report = VisualizationReport::default();
        for sample in samples.into_iter().take(config.limit) {
            let source = sample.image.describe();
            let (rows, timesteps, _, _) = sample.attention_maps.dim();
            if rows == 0 || timesteps == 0 {
                let e = OCRError::invalid_input(format!(
                    "no attention maps to render ({rows} sequences, {timesteps} timesteps)"
                ));
                warn!("Skipping visualization of {}: {}", source, e);
                report.skipped.push((source, e));
                continue;
            }
            match self.render(&sample) {
                Ok(paths) => report.written.extend(paths),
                Err(e @ OCRError::ImageNotFound { .. }) => {
                    warn!("Skipping visualization of {}: {}", source, e);
                    report.skipped.push((source, e));
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Wrote {} visualization files to {} ({} samples skipped)",
            report.written.len(),
            config.output_directory.display(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn render(&mut self, sample: &InferenceSample) -> OcrResult<[PathBuf; 2]> {
        let base = sample.image.load()?;
        let grid = self.composer.process(sample.attention_maps.view())?;

        let bases = std::slice::from_ref(&base);
        let attention = self.composer.compose_overlay(bases, &grid)?;
        let boxes = grid.boxes();
        let outlined = self
            .composer
            .compose_bounding_box_overlay(bases, boxes.view())?;

        let config = self.composer.config();
        let prediction = predictions_to_filename(&sample.predictions, &config.separator)?;
        let name = self.namer.unique(&prediction);

        let attention_path = config
            .output_directory
            .join(format!("{}_attention_map.{}", name, config.extension));
        let bbox_path = config
            .output_directory
            .join(format!("{}_bounding_box.{}", name, config.extension));

        rgb32f_to_rgb8(&attention).save(&attention_path)?;
        rgb32f_to_rgb8(&outlined).save(&bbox_path)?;
        debug!(
            "Saved {} and {}",
            attention_path.display(),
            bbox_path.display()
        );

        Ok([attention_path, bbox_path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn gray(width: u32, height: u32, v: f32) -> Rgb32FImage {
        ImageBuffer::from_pixel(width, height, Rgb([v, v, v]))
    }

    fn composer(size: [u32; 2]) -> VisualizationComposer {
        VisualizationComposer::new(VisualizationConfig::default().with_image_size(size)).unwrap()
    }

    /// Maps peaking at a distinct column per timestep.
    fn peaked_maps(rows: usize, timesteps: usize, size: usize) -> Array4<f32> {
        Array4::from_shape_fn((rows, timesteps, size, size), |(r, t, y, x)| {
            if y == r % size && x == t % size { 1.0 } else { 0.0 }
        })
    }

    #[test]
    fn test_predictions_to_filename() {
        let predictions = vec![vec![10, 11, 9, 62, 62], vec![36, 62, 1, 1, 1]];
        assert_eq!(predictions_to_filename(&predictions, "_").unwrap(), "AB9_a");
        let empty: Vec<Vec<i64>> = vec![vec![62, 62]];
        assert_eq!(predictions_to_filename(&empty, "_").unwrap(), "");
        assert!(predictions_to_filename(&[vec![99_i64]], "_").is_err());
    }

    #[test]
    fn test_artifact_namer_suffixes_repeats() {
        let mut namer = ArtifactNamer::default();
        assert_eq!(namer.unique("AB9"), "AB9");
        assert_eq!(namer.unique("AB9"), "AB9_1");
        assert_eq!(namer.unique("xy"), "xy");
        assert_eq!(namer.unique("AB9"), "AB9_2");
    }

    #[test]
    fn test_overlay_adds_into_channel() {
        let base = gray(2, 2, 0.25);
        let map = ndarray::array![[0.0_f32, 0.5], [1.0, 0.0]];
        let cell = overlay_attention(&base, map.view(), 0).unwrap();
        assert_eq!(cell.get_pixel(1, 0), &Rgb([0.75, 0.25, 0.25]));
        assert_eq!(cell.get_pixel(0, 1), &Rgb([1.25, 0.25, 0.25]));
        assert_eq!(cell.get_pixel(0, 0), &Rgb([0.25, 0.25, 0.25]));

        let wrong = Array2::<f32>::zeros((3, 2));
        assert!(overlay_attention(&base, wrong.view(), 0).is_err());
        assert!(overlay_attention(&base, map.view(), 3).is_err());
    }

    #[test]
    fn test_draw_bounding_box_outline() {
        let base = gray(10, 10, 0.0);
        let bbox = BoundingBox::from_corners((2, 3), (6, 7));
        let cell = draw_bounding_box(&base, Some(&bbox), [1.0, 0.0, 0.0], 1);

        assert_eq!(cell.get_pixel(3, 2), &Rgb([1.0, 0.0, 0.0]));
        assert_eq!(cell.get_pixel(7, 6), &Rgb([1.0, 0.0, 0.0]));
        assert_eq!(cell.get_pixel(5, 4), &Rgb([0.0, 0.0, 0.0]));
        assert_eq!(cell.get_pixel(0, 0), &Rgb([0.0, 0.0, 0.0]));

        let thick = draw_bounding_box(&base, Some(&bbox), [1.0, 0.0, 0.0], 2);
        assert_eq!(thick.get_pixel(2, 1), &Rgb([1.0, 0.0, 0.0]));

        assert_eq!(draw_bounding_box(&base, None, [1.0, 0.0, 0.0], 2), base);
    }

    #[test]
    fn test_draw_bounding_box_at_image_edge_is_clipped() {
        let base = gray(4, 4, 0.0);
        let bbox = BoundingBox::from_corners((0, 0), (3, 3));
        let cell = draw_bounding_box(&base, Some(&bbox), [0.0, 1.0, 0.0], 2);
        assert_eq!(cell.get_pixel(0, 0), &Rgb([0.0, 1.0, 0.0]));
        assert_eq!(cell.get_pixel(1, 1), &Rgb([0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_attention_grid_shape_and_boxes() {
        let composer = composer([8, 8]);
        let grid = composer.process(peaked_maps(2, 3, 8).view()).unwrap();
        assert_eq!((grid.rows(), grid.timesteps()), (2, 3));
        assert!(grid.get(2, 0).is_none());
        assert!(grid.get(0, 3).is_none());

        let boxes = grid.boxes();
        assert_eq!(boxes.dim(), (2, 3));
        assert_eq!(
            boxes[[1, 2]],
            Some(BoundingBox::from_corners((1, 2), (1, 2)))
        );
    }

    #[test]
    fn test_compose_overlay_dimensions() {
        let composer = composer([6, 5]);
        let grid = composer.process(peaked_maps(2, 4, 3).view()).unwrap();
        let base = gray(20, 12, 0.1);
        let composite = composer
            .compose_overlay(std::slice::from_ref(&base), &grid)
            .unwrap();
        // rows * height by timesteps * width
        assert_eq!(composite.dimensions(), (4 * 5, 2 * 6));
    }

    #[test]
    fn test_compose_overlay_places_cells_by_row_and_timestep() {
        let composer = composer([4, 4]);
        let grid = composer.process(peaked_maps(2, 2, 4).view()).unwrap();
        let bases = vec![gray(4, 4, 0.0), gray(4, 4, 0.5)];
        let composite = composer.compose_overlay(&bases, &grid).unwrap();

        // Row 1 uses the second base image.
        assert_eq!(composite.get_pixel(3, 3)[1], 0.0);
        assert_eq!(composite.get_pixel(0, 4)[1], 0.5);
        assert_eq!(composite.get_pixel(4, 7)[1], 0.5);
        // Peak of cell (1, 1) lands at local (1, 1) -> global (5, 5).
        assert_eq!(composite.get_pixel(5, 5)[0], 1.5);
    }

    #[test]
    fn test_compose_rejects_mismatched_base_count() {
        let composer = composer([4, 4]);
        let grid = composer.process(peaked_maps(3, 2, 4).view()).unwrap();
        let bases = vec![gray(4, 4, 0.0), gray(4, 4, 0.0)];
        assert!(composer.compose_overlay(&bases, &grid).is_err());
    }

    #[test]
    fn test_compose_bounding_box_overlay() {
        let composer = composer([8, 8]);
        let mut boxes = Array2::from_elem((1, 2), None);
        boxes[[0, 1]] = Some(BoundingBox::from_corners((2, 2), (5, 5)));
        let base = gray(8, 8, 0.0);
        let composite = composer
            .compose_bounding_box_overlay(std::slice::from_ref(&base), boxes.view())
            .unwrap();

        assert_eq!(composite.dimensions(), (16, 8));
        // The first cell has no region and stays blank.
        assert!(composite
            .enumerate_pixels()
            .filter(|(x, _, _)| *x < 8)
            .all(|(_, _, p)| p == &Rgb([0.0, 0.0, 0.0])));
        assert_eq!(composite.get_pixel(8 + 2, 2), &Rgb(BBOX_COLOR));
    }

    #[test]
    fn test_compose_empty_grid_is_error() {
        let composer = composer([4, 4]);
        let boxes: Array2<Option<BoundingBox>> = Array2::from_elem((0, 3), None);
        let base = gray(4, 4, 0.0);
        assert!(composer
            .compose_bounding_box_overlay(std::slice::from_ref(&base), boxes.view())
            .is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(VisualizationConfig::default().validate().is_ok());
        assert!(VisualizationConfig::default().with_threshold(2.0).validate().is_err());
        let mut config = VisualizationConfig::default();
        config.overlay_channel = 3;
        assert!(config.validate().is_err());
        assert!(VisualizationComposer::new(config).is_err());
    }

    #[test]
    fn test_config_from_json_uses_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vis.json");
        std::fs::write(&path, r#"{ "threshold": 0.3, "extension": "png" }"#).unwrap();

        let config = VisualizationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.extension, "png");
        assert_eq!(config.image_size, DEFAULT_IMAGE_SIZE);
        assert_eq!(config.limit, DEFAULT_VISUALIZE_LIMIT);
        assert_eq!(config.bbox_thickness, 2);

        std::fs::write(&path, r#"{ "threshold": 1.5 }"#).unwrap();
        assert!(matches!(
            VisualizationConfig::from_json_file(&path),
            Err(OCRError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_visualizer_writes_artifacts_and_skips_missing_images() {
        let out = tempfile::tempdir().unwrap();
        let config = VisualizationConfig::default()
            .with_image_size([8, 8])
            .with_extension("png")
            .with_output_directory(out.path());
        let mut visualizer = Visualizer::new(config).unwrap();

        let sample = InferenceSample {
            image: SampleImage::Pixels(gray(8, 8, 0.2)),
            attention_maps: peaked_maps(1, 3, 4),
            predictions: vec![vec![10, 11, 9, 62]],
        };
        let missing = InferenceSample {
            image: SampleImage::Path(PathBuf::from("/nonexistent/img.png")),
            ..sample.clone()
        };

        let report = visualizer
            .run(vec![sample.clone(), missing, sample])
            .unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0].1, OCRError::ImageNotFound { .. }));
        let names: Vec<String> = report
            .written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "AB9_attention_map.png",
                "AB9_bounding_box.png",
                "AB9_1_attention_map.png",
                "AB9_1_bounding_box.png",
            ]
        );

        let saved = image::open(&report.written[0]).unwrap();
        assert_eq!((saved.width(), saved.height()), (3 * 8, 8));
    }

    #[test]
    fn test_visualizer_respects_limit() {
        let out = tempfile::tempdir().unwrap();
        let config = VisualizationConfig::default()
            .with_image_size([4, 4])
            .with_extension("png")
            .with_limit(2)
            .with_output_directory(out.path());
        let mut visualizer = Visualizer::new(config).unwrap();

        let samples: Vec<InferenceSample> = (0..5)
            .map(|i| InferenceSample {
                image: SampleImage::Pixels(gray(4, 4, 0.0)),
                attention_maps: peaked_maps(1, 1, 4),
                predictions: vec![vec![i, 62]],
            })
            .collect();
        let report = visualizer.run(samples).unwrap();
        assert_eq!(report.written.len(), 4);
    }

    #[test]
    fn test_load_predictions_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.json");
        std::fs::write(
            &path,
            r#"[{
                "image_path": "img_AB9.jpg",
                "attention_maps": [[[[0.0, 1.0], [0.5, 0.2]], [[1.0, 0.0], [0.0, 0.0]]]],
                "predictions": [[10, 11, 62]]
            }]"#,
        )
        .unwrap();

        let samples = load_predictions(&path).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].attention_maps.dim(), (1, 2, 2, 2));
        assert_eq!(samples[0].attention_maps[[0, 1, 0, 0]], 1.0);
        assert!(matches!(samples[0].image, SampleImage::Path(_)));
    }

    #[test]
    fn test_visualizer_skips_samples_without_attention_maps() {
        let out = tempfile::tempdir().unwrap();
        let config = VisualizationConfig::default()
            .with_image_size([4, 4])
            .with_extension("png")
            .with_output_directory(out.path());
        let mut visualizer = Visualizer::new(config).unwrap();

        let sample = InferenceSample {
            image: SampleImage::Pixels(gray(4, 4, 0.0)),
            attention_maps: peaked_maps(1, 2, 4),
            predictions: vec![vec![10, 62]],
        };
        let no_rows = InferenceSample {
            attention_maps: Array4::zeros((0, 2, 4, 4)),
            predictions: vec![],
            ..sample.clone()
        };
        let no_timesteps = InferenceSample {
            attention_maps: Array4::zeros((1, 0, 4, 4)),
            ..sample.clone()
        };

        let report = visualizer.run(vec![no_rows, sample, no_timesteps]).unwrap();
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        assert!(report
            .skipped
            .iter()
            .all(|(_, e)| matches!(e, OCRError::InvalidInput { .. })));
    }

    fn write_predictions(dir: &Path, attention_maps: &str) -> PathBuf {
        let path = dir.join("predictions.json");
        std::fs::write(
            &path,
            format!(
                r#"[{{ "image_path": "x.jpg", "attention_maps": {attention_maps}, "predictions": [] }}]"#
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_load_predictions_rejects_ragged_maps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_predictions(dir.path(), "[[[[0.0, 1.0], [0.5]]]]");
        assert!(matches!(
            load_predictions(&path),
            Err(OCRError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_load_predictions_rejects_ragged_maps_with_matching_total() {
        let dir = tempfile::tempdir().unwrap();
        // Eight values in total, as a 1x2x2x2 tensor would hold, but the second
        // map has rows of three and one.
        let path = write_predictions(dir.path(), "[[[[0, 1], [2, 3]], [[4, 5, 6], [7]]]]");
        assert!(matches!(
            load_predictions(&path),
            Err(OCRError::InvalidInput { .. })
        ));

        let path = write_predictions(dir.path(), "[[[[0, 1], [2, 3]]], [[[4, 5]], [[6, 7]]]]");
        assert!(matches!(
            load_predictions(&path),
            Err(OCRError::InvalidInput { .. })
        ));
    }
}
