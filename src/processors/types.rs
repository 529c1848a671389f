//! Types used in image processing operations
//!
//! This module defines the channel layout used when images cross the boundary
//! between in-memory float arrays and storage formats.

use serde::{Deserialize, Serialize};

/// Specifies the order of channels in an image tensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    /// Channel, Height, Width order (common in PyTorch)
    CHW,
    /// Height, Width, Channel order (common in TensorFlow)
    #[default]
    HWC,
}

impl ChannelOrder {
    /// Selects the layout from a `channels_first` flag.
    pub fn from_channels_first(channels_first: bool) -> Self {
        if channels_first {
            ChannelOrder::CHW
        } else {
            ChannelOrder::HWC
        }
    }

    /// Splits an array shape into `(height, width, channels)` for this layout.
    pub fn split_shape(&self, shape: [usize; 3]) -> (usize, usize, usize) {
        match self {
            ChannelOrder::CHW => (shape[1], shape[2], shape[0]),
            ChannelOrder::HWC => (shape[0], shape[1], shape[2]),
        }
    }
}
