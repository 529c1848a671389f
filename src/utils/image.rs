//! Utility functions for image processing.
//!
//! This module provides functions for loading images, converting them between
//! the in-memory float representation (`[0, 1]`, HWC or CHW) and 8-bit storage
//! images, and resizing them to a target size.

use crate::core::errors::{OCRError, OcrResult};
use crate::processors::types::ChannelOrder;
use image::{DynamicImage, ImageBuffer, Rgb, Rgb32FImage, RgbImage, imageops};
use ndarray::{Array3, ArrayView3};
use std::path::Path;

/// Loads an image as float RGB with values in `[0, 1]`.
///
/// # Errors
///
/// * `OCRError::ImageNotFound` if nothing exists at `path`.
/// * `OCRError::ImageLoad` if the file cannot be decoded.
pub fn load_image_f32(path: &Path) -> OcrResult<Rgb32FImage> {
    Ok(open_existing(path)?.to_rgb32f())
}

fn open_existing(path: &Path) -> OcrResult<DynamicImage> {
    if !path.is_file() {
        return Err(OCRError::ImageNotFound {
            path: path.to_path_buf(),
        });
    }
    image::open(path).map_err(OCRError::ImageLoad)
}

/// Loads a batch of images as float RGB with a custom parallel threshold.
///
/// Uses rayon when the number of paths exceeds the threshold, or
/// `DEFAULT_PARALLEL_THRESHOLD` if none is provided. Output order follows `paths`.
///
/// # Errors
///
/// Returns the first error encountered if any image cannot be loaded.
pub fn load_images_f32_with_threshold<P: AsRef<Path> + Send + Sync>(
    paths: &[P],
    parallel_threshold: Option<usize>,
) -> OcrResult<Vec<Rgb32FImage>> {
    use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;

    let threshold = parallel_threshold.unwrap_or(DEFAULT_PARALLEL_THRESHOLD);

    if paths.len() > threshold {
        use rayon::prelude::*;
        paths
            .par_iter()
            .map(|p| load_image_f32(p.as_ref()))
            .collect()
    } else {
        paths.iter().map(|p| load_image_f32(p.as_ref())).collect()
    }
}

/// Resizes a float image to `[height, width]` with bilinear filtering.
///
/// Returns a copy when the image already has the requested size.
pub fn resize_f32(img: &Rgb32FImage, size: [u32; 2]) -> Rgb32FImage {
    let [height, width] = size;
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    imageops::resize(img, width, height, imageops::FilterType::Triangle)
}

/// Converts a float image into an array in the requested layout.
pub fn rgb32f_to_array(img: &Rgb32FImage, order: ChannelOrder) -> Array3<f32> {
    let (width, height) = img.dimensions();
    let (h, w) = (height as usize, width as usize);
    match order {
        ChannelOrder::HWC => {
            Array3::from_shape_fn((h, w, 3), |(y, x, c)| img.get_pixel(x as u32, y as u32)[c])
        }
        ChannelOrder::CHW => {
            Array3::from_shape_fn((3, h, w), |(c, y, x)| img.get_pixel(x as u32, y as u32)[c])
        }
    }
}

/// Converts a 3-channel float array in the given layout into a float image.
///
/// # Errors
///
/// Returns `OCRError::InvalidInput` if the array does not have exactly 3 channels
/// or has an empty spatial extent.
pub fn array_to_rgb32f(array: ArrayView3<'_, f32>, order: ChannelOrder) -> OcrResult<Rgb32FImage> {
    let shape = array.shape();
    let (height, width, channels) = order.split_shape([shape[0], shape[1], shape[2]]);

    if channels != 3 {
        return Err(OCRError::validation_error(
            "array_to_rgb32f",
            "channels",
            "3",
            &channels.to_string(),
        ));
    }
    if height == 0 || width == 0 {
        return Err(OCRError::invalid_input("image array has no pixels"));
    }

    Ok(ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        match order {
            ChannelOrder::HWC => Rgb([array[[y, x, 0]], array[[y, x, 1]], array[[y, x, 2]]]),
            ChannelOrder::CHW => Rgb([array[[0, y, x]], array[[1, y, x]], array[[2, y, x]]]),
        }
    }))
}

/// Converts a float image in `[0, 1]` to 8-bit, clamping out-of-range values.
pub fn rgb32f_to_rgb8(img: &Rgb32FImage) -> RgbImage {
    let (width, height) = img.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        let p = img.get_pixel(x, y);
        Rgb([to_u8(p[0]), to_u8(p[1]), to_u8(p[2])])
    })
}

fn to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
