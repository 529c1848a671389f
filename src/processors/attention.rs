//! Attention map post-processing.
//!
//! The sequence decoder emits one raw 2D attention map per (sample, timestep).
//! This module rescales a map to `[0, 1]`, resizes it to the image size with
//! bilinear interpolation, and thresholds it into an axis-aligned bounding box.

use crate::core::errors::{OCRError, OcrResult};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// An inclusive axis-aligned box in pixel space.
///
/// Coordinates are `(row, col)`, i.e. `(y, x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// First row covered by the box.
    pub top: usize,
    /// First column covered by the box.
    pub left: usize,
    /// Last row covered by the box.
    pub bottom: usize,
    /// Last column covered by the box.
    pub right: usize,
}

impl BoundingBox {
    /// Creates a box from its inclusive corners given as `(row, col)`.
    pub fn from_corners(top_left: (usize, usize), bottom_right: (usize, usize)) -> Self {
        Self {
            top: top_left.0,
            left: top_left.1,
            bottom: bottom_right.0,
            right: bottom_right.1,
        }
    }

    /// Top-left corner as `(row, col)`.
    pub fn top_left(&self) -> (usize, usize) {
        (self.top, self.left)
    }

    /// Bottom-right corner as `(row, col)`.
    pub fn bottom_right(&self) -> (usize, usize) {
        (self.bottom, self.right)
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        self.right - self.left + 1
    }

    /// Number of rows covered.
    pub fn height(&self) -> usize {
        self.bottom - self.top + 1
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Returns true if `(row, col)` lies inside the box.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.top..=self.bottom).contains(&row) && (self.left..=self.right).contains(&col)
    }
}

/// Area of an optional box; no region counts as zero pixels.
pub fn box_area(bbox: Option<&BoundingBox>) -> usize {
    bbox.map_or(0, BoundingBox::area)
}

/// Rescales `map` linearly so its observed minimum becomes 0 and its maximum 1.
///
/// Extremes are taken over finite cells only, and non-finite cells map to 0. A
/// map without finite spread (uniform, empty, or all non-finite) carries no
/// localization signal and yields an all-zero map of the same shape.
pub fn normalize(map: ArrayView2<'_, f32>) -> Array2<f32> {
    let (min, max) = map
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return Array2::zeros(map.raw_dim());
    }

    map.mapv(|v| {
        if v.is_finite() {
            ((v - min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        }
    })
}

/// Resizes `map` to `(height, width)` with bilinear interpolation.
///
/// Sampling uses half-pixel centres and clamps at the edges, so a constant map
/// stays constant and every output value lies within the input's range.
///
/// # Errors
///
/// Returns `OCRError::InvalidInput` if the map or the target size is empty.
pub fn resize(map: ArrayView2<'_, f32>, target_size: (usize, usize)) -> OcrResult<Array2<f32>> {
    let (src_h, src_w) = map.dim();
    let (dst_h, dst_w) = target_size;

    if src_h == 0 || src_w == 0 {
        return Err(OCRError::invalid_input("cannot resize an empty attention map"));
    }
    if dst_h == 0 || dst_w == 0 {
        return Err(OCRError::invalid_input(format!(
            "resize target must be non-empty, got {}x{}",
            dst_h, dst_w
        )));
    }

    if (src_h, src_w) == (dst_h, dst_w) {
        return Ok(map.to_owned());
    }

    let rows: Vec<(usize, usize, f32)> = sample_positions(src_h, dst_h);
    let cols: Vec<(usize, usize, f32)> = sample_positions(src_w, dst_w);

    Ok(Array2::from_shape_fn((dst_h, dst_w), |(y, x)| {
        let (y0, y1, wy) = rows[y];
        let (x0, x1, wx) = cols[x];
        let top = map[[y0, x0]] * (1.0 - wx) + map[[y0, x1]] * wx;
        let bottom = map[[y1, x0]] * (1.0 - wx) + map[[y1, x1]] * wx;
        top * (1.0 - wy) + bottom * wy
    }))
}

/// Source neighbours and blend weight for each destination index along one axis.
fn sample_positions(src: usize, dst: usize) -> Vec<(usize, usize, f32)> {
    let scale = src as f32 / dst as f32;
    let last = src - 1;
    (0..dst)
        .map(|i| {
            let pos = ((i as f32 + 0.5) * scale - 0.5).clamp(0.0, last as f32);
            let i0 = pos.floor() as usize;
            let i1 = (i0 + 1).min(last);
            (i0, i1, pos - i0 as f32)
        })
        .collect()
}

/// Returns the smallest box covering every pixel whose value is `>= threshold`.
///
/// Returns `None` when no pixel meets the threshold. Raising the threshold never
/// enlarges the returned box.
pub fn bounding_box(map: ArrayView2<'_, f32>, threshold: f32) -> Option<BoundingBox> {
    map.indexed_iter()
        .filter(|&(_, &v)| v >= threshold)
        .fold(None, |acc: Option<BoundingBox>, ((row, col), _)| {
            Some(match acc {
                None => BoundingBox::from_corners((row, col), (row, col)),
                Some(b) => BoundingBox {
                    top: b.top.min(row),
                    left: b.left.min(col),
                    bottom: b.bottom.max(row),
                    right: b.right.max(col),
                },
            })
        })
}

/// A normalized, resized attention map and the box derived from it.
#[derive(Debug, Clone)]
pub struct ProcessedAttention {
    /// Attention values in `[0, 1]` at the target size.
    pub map: Array2<f32>,
    /// Region clearing the threshold, if any.
    pub bbox: Option<BoundingBox>,
}

/// Runs normalize, resize and threshold over raw attention maps.
#[derive(Debug, Clone, Copy)]
pub struct AttentionMapProcessor {
    target_size: (usize, usize),
    threshold: f32,
}

impl AttentionMapProcessor {
    /// Creates a processor producing maps of `(height, width)` thresholded at `threshold`.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::ConfigError` if the target size is empty or the
    /// threshold lies outside `[0, 1]`.
    pub fn new(target_size: (usize, usize), threshold: f32) -> OcrResult<Self> {
        if target_size.0 == 0 || target_size.1 == 0 {
            return Err(OCRError::config_error(format!(
                "attention target size must be non-empty, got {}x{}",
                target_size.0, target_size.1
            )));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(OCRError::config_error(format!(
                "attention threshold must be between 0.0 and 1.0, got {}",
                threshold
            )));
        }
        Ok(Self {
            target_size,
            threshold,
        })
    }

    /// The `(height, width)` maps are resized to.
    pub fn target_size(&self) -> (usize, usize) {
        self.target_size
    }

    /// The threshold boxes are derived with.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Normalizes, resizes and thresholds one raw attention map.
    pub fn process(&self, raw: ArrayView2<'_, f32>) -> OcrResult<ProcessedAttention> {
        let normalized = normalize(raw);
        let map = resize(normalized.view(), self.target_size)?;
        let bbox = bounding_box(map.view(), self.threshold);
        Ok(ProcessedAttention { map, bbox })
    }
}
