//! Pure transformations over labels and attention maps.
//!
//! # Modules
//!
//! * `attention` - Attention map normalization, resizing and bounding boxes
//! * `codec` - Character/class-id codec and fixed-length labels
//! * `types` - Type definitions used across the processors module

pub mod attention;
pub mod codec;
pub mod types;

pub use attention::{
    AttentionMapProcessor, BoundingBox, ProcessedAttention, bounding_box, box_area, normalize,
    resize,
};
pub use codec::{CharacterClassCodec, Label, build_label, decode, decode_label, encode};
pub use types::*;
