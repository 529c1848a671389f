//! Persisted record format.
//!
//! A record file starts with a header (`b"SYNR"`, a `u32` format version and
//! the declared `u32` label length) followed by self-delimited records. Each
//! record is a `u64` little-endian byte count and a bincode payload with two
//! fields: `path` (variable-length bytes) and `label` (class ids, exactly the
//! declared label length).

use crate::core::constants::PAD_CLASS_ID;
use crate::core::errors::{OCRError, OcrResult};
use crate::processors::codec::{Label, decode_label};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use tracing::debug;

/// Leading bytes of every record file.
pub const RECORD_MAGIC: [u8; 4] = *b"SYNR";

/// Current record file format version.
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// Upper bound on one serialized record, guarding against corrupt length prefixes.
pub const MAX_RECORD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
struct RecordPayload {
    path: Vec<u8>,
    label: Vec<i64>,
}

/// An image reference paired with its fixed-length label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque reference to the image, usually a file path.
    pub image_ref: String,
    /// The encoded label.
    pub label: Label,
}

impl Record {
    /// Creates a record.
    pub fn new(image_ref: impl Into<String>, label: Label) -> Self {
        Self {
            image_ref: image_ref.into(),
            label,
        }
    }

    /// Decodes the label back to its string.
    pub fn text(&self) -> OcrResult<String> {
        decode_label(self.label.ids())
    }
}

/// Serializes and parses single records for a fixed label length.
///
/// Stateless apart from the declared length, so it can be shared freely
/// across worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    string_length: usize,
}

impl RecordCodec {
    /// Creates a codec for labels of exactly `string_length` ids.
    pub fn new(string_length: usize) -> Self {
        Self { string_length }
    }

    /// The declared label length.
    pub fn string_length(&self) -> usize {
        self.string_length
    }

    /// Serializes one record.
    ///
    /// # Errors
    ///
    /// * `OCRError::SchemaMismatch` if the label length differs from the
    ///   declared length; the length is never inferred per record.
    /// * `OCRError::InvalidClassId` if an id lies outside `[0, 62]`.
    pub fn encode_record(&self, image_ref: &str, label: &Label) -> OcrResult<Vec<u8>> {
        self.check_length(label.len())?;
        check_class_ids(label.ids())?;
        let payload = RecordPayload {
            path: image_ref.as_bytes().to_vec(),
            label: label.ids().to_vec(),
        };
        Ok(bincode::serialize(&payload)?)
    }

    /// Parses one record produced by [`RecordCodec::encode_record`].
    ///
    /// # Errors
    ///
    /// * `OCRError::SchemaMismatch` if the stored label length differs from the declared length.
    /// * `OCRError::InvalidClassId` if a stored id lies outside `[0, 62]`.
    /// * `OCRError::Serialization` if the bytes are not a record.
    pub fn decode_record(&self, bytes: &[u8]) -> OcrResult<(String, Label)> {
        let payload: RecordPayload = bincode::deserialize(bytes)?;
        self.check_length(payload.label.len())?;
        check_class_ids(&payload.label)?;

        let image_ref = String::from_utf8(payload.path)
            .map_err(|e| OCRError::invalid_input(format!("record path is not UTF-8: {e}")))?;

        Ok((image_ref, Label::from_ids(payload.label)))
    }

    fn check_length(&self, actual: usize) -> OcrResult<()> {
        if actual != self.string_length {
            return Err(OCRError::SchemaMismatch {
                expected: self.string_length,
                actual,
            });
        }
        Ok(())
    }
}

/// Every stored id is a character class or the pad sentinel.
fn check_class_ids(ids: &[i64]) -> OcrResult<()> {
    match ids.iter().find(|&&id| !(0..=PAD_CLASS_ID).contains(&id)) {
        Some(&class_id) => Err(OCRError::InvalidClassId { class_id }),
        None => Ok(()),
    }
}

/// Appends length-prefixed records to a record file.
pub struct RecordWriter<W: Write> {
    inner: W,
    codec: RecordCodec,
    written: usize,
}

impl RecordWriter<BufWriter<File>> {
    /// Creates (or truncates) a record file at `path`.
    pub fn create(path: &Path, string_length: usize) -> OcrResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), string_length)
    }
}

impl<W: Write> RecordWriter<W> {
    /// Wraps `inner` and writes the file header.
    pub fn new(mut inner: W, string_length: usize) -> OcrResult<Self> {
        let declared = u32::try_from(string_length).map_err(|_| {
            OCRError::config_error(format!("string length {string_length} does not fit in u32"))
        })?;
        inner.write_all(&RECORD_MAGIC)?;
        inner.write_all(&RECORD_FORMAT_VERSION.to_le_bytes())?;
        inner.write_all(&declared.to_le_bytes())?;

        Ok(Self {
            inner,
            codec: RecordCodec::new(string_length),
            written: 0,
        })
    }

    /// Serializes and appends one record.
    pub fn write_record(&mut self, image_ref: &str, label: &Label) -> OcrResult<()> {
        let bytes = self.codec.encode_record(image_ref, label)?;
        self.inner.write_all(&(bytes.len() as u64).to_le_bytes())?;
        self.inner.write_all(&bytes)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> OcrResult<W> {
        self.inner.flush()?;
        debug!("Finished record file with {} records", self.written);
        Ok(self.inner)
    }
}

/// Iterates the records of a record file in stored order.
///
/// A record whose label length or ids do not match the schema yields an error
/// for that record only; a truncated or corrupt frame ends the iteration.
pub struct RecordReader<R: Read> {
    inner: R,
    codec: RecordCodec,
    finished: bool,
}

impl RecordReader<BufReader<File>> {
    /// Opens the record file at `path`, expecting labels of `string_length` ids.
    pub fn open(path: &Path, string_length: usize) -> OcrResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), string_length)
    }
}

impl<R: Read> RecordReader<R> {
    /// Reads and checks the header.
    ///
    /// # Errors
    ///
    /// * `OCRError::InvalidInput` if the magic bytes or version are not recognized.
    /// * `OCRError::SchemaMismatch` if the declared label length differs from `string_length`.
    pub fn new(mut inner: R, string_length: usize) -> OcrResult<Self> {
        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic)?;
        if magic != RECORD_MAGIC {
            return Err(OCRError::invalid_input("not a record file (bad magic bytes)"));
        }

        let version = read_u32(&mut inner)?;
        if version != RECORD_FORMAT_VERSION {
            return Err(OCRError::invalid_input(format!(
                "unsupported record format version {version}"
            )));
        }

        let declared = read_u32(&mut inner)? as usize;
        if declared != string_length {
            return Err(OCRError::SchemaMismatch {
                expected: string_length,
                actual: declared,
            });
        }

        Ok(Self {
            inner,
            codec: RecordCodec::new(string_length),
            finished: false,
        })
    }

    /// Reads the next frame; `None` on a clean end of file.
    fn read_frame(&mut self) -> OcrResult<Option<Vec<u8>>> {
        let mut prefix = [0u8; 8];
        let mut filled = 0;
        while filled < prefix.len() {
            match self.inner.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => return Ok(None),
            8 => {}
            n => {
                return Err(OCRError::invalid_input(format!(
                    "truncated record length prefix ({n} of 8 bytes)"
                )));
            }
        }

        let length = u64::from_le_bytes(prefix);
        if length > MAX_RECORD_BYTES {
            return Err(OCRError::invalid_input(format!(
                "record of {length} bytes exceeds the {MAX_RECORD_BYTES} byte limit"
            )));
        }

        let mut bytes = vec![0u8; length as usize];
        self.inner.read_exact(&mut bytes)?;
        Ok(Some(bytes))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = OcrResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(bytes)) => Some(
                self.codec
                    .decode_record(&bytes)
                    .map(|(image_ref, label)| Record { image_ref, label }),
            ),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn read_u32<R: Read>(reader: &mut R) -> OcrResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads every record of a file, failing on the first invalid one.
pub fn read_records(path: &Path, string_length: usize) -> OcrResult<Vec<Record>> {
    RecordReader::open(path, string_length)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::codec::build_label;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_record() {
        let codec = RecordCodec::new(10);
        let label = build_label("AB9", 10).unwrap();
        let bytes = codec.encode_record("data/img_AB9.jpg", &label).unwrap();
        let (image_ref, decoded) = codec.decode_record(&bytes).unwrap();
        assert_eq!(image_ref, "data/img_AB9.jpg");
        assert_eq!(decoded, label);
    }

    #[test]
    fn test_encode_rejects_label_of_wrong_length() {
        let codec = RecordCodec::new(10);
        let label = build_label("AB9", 5).unwrap();
        assert!(matches!(
            codec.encode_record("img_AB9.jpg", &label),
            Err(OCRError::SchemaMismatch {
                expected: 10,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_decode_with_different_string_length_is_schema_mismatch() {
        let bytes = RecordCodec::new(5)
            .encode_record("img_AB9.jpg", &build_label("AB9", 5).unwrap())
            .unwrap();
        assert!(matches!(
            RecordCodec::new(10).decode_record(&bytes),
            Err(OCRError::SchemaMismatch {
                expected: 10,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_decode_rejects_ids_outside_class_range() {
        let codec = RecordCodec::new(3);
        let bytes = bincode::serialize(&RecordPayload {
            path: b"x.jpg".to_vec(),
            label: vec![10, 63, 62],
        })
        .unwrap();
        assert!(matches!(
            codec.decode_record(&bytes),
            Err(OCRError::InvalidClassId { class_id: 63 })
        ));
    }

    #[test]
    fn test_encode_rejects_ids_outside_class_range() {
        let codec = RecordCodec::new(3);
        assert!(matches!(
            codec.encode_record("x.jpg", &Label::from_ids(vec![10, 99, 62])),
            Err(OCRError::InvalidClassId { class_id: 99 })
        ));
        assert!(matches!(
            codec.encode_record("x.jpg", &Label::from_ids(vec![-1, 62, 62])),
            Err(OCRError::InvalidClassId { class_id: -1 })
        ));

        let mut writer = RecordWriter::new(Vec::new(), 3).unwrap();
        assert!(writer
            .write_record("x.jpg", &Label::from_ids(vec![10, 63, 62]))
            .is_err());
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn test_decode_garbage_is_serialization_error() {
        let codec = RecordCodec::new(3);
        assert!(matches!(
            codec.decode_record(&[1, 2, 3]),
            Err(OCRError::Serialization(_))
        ));
    }

    #[test]
    fn test_writer_reader_preserve_order() {
        let mut writer = RecordWriter::new(Vec::new(), 4).unwrap();
        for text in ["A", "bc", "D9z", ""] {
            let label = build_label(text, 4).unwrap();
            writer
                .write_record(&format!("img_{text}.jpg"), &label)
                .unwrap();
        }
        assert_eq!(writer.written(), 4);
        let bytes = writer.finish().unwrap();

        let records: Vec<Record> = RecordReader::new(Cursor::new(bytes), 4)
            .unwrap()
            .collect::<OcrResult<_>>()
            .unwrap();
        let texts: Vec<String> = records.iter().map(|r| r.text().unwrap()).collect();
        assert_eq!(texts, vec!["A", "bc", "D9z", ""]);
        assert_eq!(records[2].image_ref, "img_D9z.jpg");
    }

    #[test]
    fn test_reader_rejects_header_with_other_string_length() {
        let bytes = RecordWriter::new(Vec::new(), 5).unwrap().finish().unwrap();
        assert!(matches!(
            RecordReader::new(Cursor::new(bytes), 10),
            Err(OCRError::SchemaMismatch {
                expected: 10,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_reader_rejects_bad_magic() {
        let bytes = b"NOPE\x01\x00\x00\x00\x0a\x00\x00\x00".to_vec();
        assert!(RecordReader::new(Cursor::new(bytes), 10).is_err());
    }

    #[test]
    fn test_reader_reports_truncated_frame_once() {
        let mut writer = RecordWriter::new(Vec::new(), 3).unwrap();
        writer
            .write_record("a.jpg", &build_label("a", 3).unwrap())
            .unwrap();
        let mut bytes = writer.finish().unwrap();
        bytes.truncate(bytes.len() - 2);

        let mut reader = RecordReader::new(Cursor::new(bytes), 3).unwrap();
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_read_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.records");
        let mut writer = RecordWriter::create(&path, 10).unwrap();
        writer
            .write_record("img_AB9.jpg", &build_label("AB9", 10).unwrap())
            .unwrap();
        writer.finish().unwrap();

        let records = read_records(&path, 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text().unwrap(), "AB9");
        assert_eq!(records[0].label.ids(), &[10, 11, 9, 62, 62, 62, 62, 62, 62, 62]);
    }
}
