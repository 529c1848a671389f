//! Utility functions for the crate.
//!
//! This module provides image loading and conversion helpers, attention
//! visualization, and logging setup.

pub mod image;
#[cfg(feature = "visualization")]
pub mod visualization;

// Re-export image processing functions
pub use image::{
    array_to_rgb32f, load_image_f32, load_images_f32_with_threshold, resize_f32, rgb32f_to_array,
    rgb32f_to_rgb8,
};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
