//! Character/class-id codec for alphanumeric labels.
//!
//! The alphabet is the ordered union of `0-9` (ids 0-9), `A-Z` (ids 10-35) and
//! `a-z` (ids 36-61). Id 62 is the pad sentinel: it fills fixed-length labels
//! past the end of the string and terminates decoding.

use crate::core::constants::{ALPHABET_SIZE, NUM_CLASSES, PAD_CLASS_ID};
use crate::core::errors::{OCRError, OcrResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static ALPHANUMERIC: Lazy<CharacterClassCodec> = Lazy::new(CharacterClassCodec::build);

/// A fixed-length sequence of class ids.
///
/// Positions past the end of the original string hold [`PAD_CLASS_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(Vec<i64>);

impl Label {
    /// Wraps raw class ids without validation.
    pub fn from_ids(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    /// The class ids, padding included.
    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    /// The fixed length of the label.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the label has no positions at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the label, returning its class ids.
    pub fn into_ids(self) -> Vec<i64> {
        self.0
    }
}

impl AsRef<[i64]> for Label {
    fn as_ref(&self) -> &[i64] {
        &self.0
    }
}

/// Bidirectional mapping between alphanumeric characters and class ids.
///
/// The table is built once on first use and shared read-only afterwards; use
/// [`CharacterClassCodec::alphanumeric`] to obtain it.
#[derive(Debug)]
pub struct CharacterClassCodec {
    class_ids: HashMap<char, i64>,
    characters: Vec<char>,
}

impl CharacterClassCodec {
    fn build() -> Self {
        let characters: Vec<char> = ('0'..='9').chain('A'..='Z').chain('a'..='z').collect();
        debug_assert_eq!(characters.len(), ALPHABET_SIZE);

        let class_ids = characters
            .iter()
            .enumerate()
            .map(|(id, &c)| (c, id as i64))
            .collect();

        Self {
            class_ids,
            characters,
        }
    }

    /// Returns the shared alphanumeric codec.
    pub fn alphanumeric() -> &'static Self {
        &ALPHANUMERIC
    }

    /// The pad sentinel id.
    pub fn pad_id(&self) -> i64 {
        PAD_CLASS_ID
    }

    /// Number of classes, pad sentinel included.
    pub fn num_classes(&self) -> usize {
        NUM_CLASSES
    }

    /// Returns true if `c` belongs to the alphabet.
    pub fn contains(&self, c: char) -> bool {
        self.class_ids.contains_key(&c)
    }

    /// Encodes one character into its class id.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidCharacter` for any character outside the alphabet.
    pub fn encode(&self, c: char) -> OcrResult<i64> {
        self.class_ids
            .get(&c)
            .copied()
            .ok_or(OCRError::InvalidCharacter { character: c })
    }

    /// Decodes one class id into its character.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidClassId` for the pad sentinel and for ids out of range.
    pub fn decode(&self, class_id: i64) -> OcrResult<char> {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.characters.get(idx).copied())
            .ok_or(OCRError::InvalidClassId { class_id })
    }

    /// Encodes `text` and right-pads it with the sentinel up to `target_length`.
    ///
    /// # Errors
    ///
    /// * `OCRError::LabelTooLong` if `text` has more than `target_length` characters.
    /// * `OCRError::InvalidCharacter` for the first character outside the alphabet.
    pub fn build_label(&self, text: &str, target_length: usize) -> OcrResult<Label> {
        let length = text.chars().count();
        if length > target_length {
            return Err(OCRError::LabelTooLong {
                length,
                max_length: target_length,
            });
        }

        let mut ids = Vec::with_capacity(target_length);
        for c in text.chars() {
            ids.push(self.encode(c)?);
        }
        ids.resize(target_length, PAD_CLASS_ID);

        Ok(Label(ids))
    }

    /// Decodes class ids up to the first sentinel (exclusive) or the end of the sequence.
    ///
    /// Ids after the first sentinel are ignored.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidClassId` if an id before the first sentinel is out of range.
    pub fn decode_label(&self, ids: &[i64]) -> OcrResult<String> {
        ids.iter()
            .take_while(|&&id| id != PAD_CLASS_ID)
            .map(|&id| self.decode(id))
            .collect()
    }
}

/// Encodes one character with the shared alphanumeric codec.
pub fn encode(c: char) -> OcrResult<i64> {
    CharacterClassCodec::alphanumeric().encode(c)
}

/// Decodes one class id with the shared alphanumeric codec.
pub fn decode(class_id: i64) -> OcrResult<char> {
    CharacterClassCodec::alphanumeric().decode(class_id)
}

/// Builds a fixed-length label with the shared alphanumeric codec.
pub fn build_label(text: &str, target_length: usize) -> OcrResult<Label> {
    CharacterClassCodec::alphanumeric().build_label(text, target_length)
}

/// Decodes a label with the shared alphanumeric codec.
pub fn decode_label(ids: &[i64]) -> OcrResult<String> {
    CharacterClassCodec::alphanumeric().decode_label(ids)
}
