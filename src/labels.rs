//
// labels.rs
// Tag2Dcm-rs
//
// Label-map contract plus the default decoder for raw `.tag` segmentation files.
//

use std::path::Path;

use ndarray::{Array, ArrayD, IxDyn};
use tracing::debug;

use crate::error::{Result, Tag2DcmError};

/// Byte that terminates the textual header of a `.tag` file.
const TAG_HEADER_TERMINATOR: u8 = 0x0C;

/// One integer label per image sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    values: ArrayD<u16>,
}

impl LabelMap {
    pub fn new(values: ArrayD<u16>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &ArrayD<u16> {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }
}

/// Anything able to decode a label file into a map of a known shape.
pub trait LabelReader {
    fn read_labels(&self, path: &Path, expected_shape: &[usize]) -> Result<LabelMap>;
}

impl<F> LabelReader for F
where
    F: Fn(&Path, &[usize]) -> Result<LabelMap>,
{
    fn read_labels(&self, path: &Path, expected_shape: &[usize]) -> Result<LabelMap> {
        self(path, expected_shape)
    }
}

/// Reads labels and rejects any map whose shape differs from `expected_shape`.
pub fn read_checked(
    reader: &dyn LabelReader,
    path: &Path,
    expected_shape: &[usize],
) -> Result<LabelMap> {
    let labels = reader.read_labels(path, expected_shape)?;
    if labels.shape() != expected_shape {
        return Err(Tag2DcmError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            actual: labels.shape().to_vec(),
        });
    }
    Ok(labels)
}

/// Decoder for `.tag` files: a text header ended by a form feed, one padding
/// byte, then one unsigned byte per sample in row-major order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagFileReader;

impl TagFileReader {
    pub fn decode(&self, path: &Path, bytes: &[u8], expected_shape: &[usize]) -> Result<LabelMap> {
        let header_end = bytes
            .iter()
            .position(|&b| b == TAG_HEADER_TERMINATOR)
            .ok_or_else(|| Tag2DcmError::format(path, "no header terminator in tag file"))?;
        let payload = bytes.get(header_end + 2..).unwrap_or_default();

        let expected_len: usize = expected_shape.iter().product();
        if payload.len() != expected_len {
            return Err(Tag2DcmError::ShapeMismatch {
                expected: expected_shape.to_vec(),
                actual: vec![payload.len()],
            });
        }

        let values = payload.iter().map(|&b| u16::from(b)).collect();
        let values = Array::from_shape_vec(IxDyn(expected_shape), values)
            .map_err(|e| Tag2DcmError::format(path, e))?;
        debug!(?path, header_len = header_end, "Decoded tag file");
        Ok(LabelMap::new(values))
    }
}

impl LabelReader for TagFileReader {
    fn read_labels(&self, path: &Path, expected_shape: &[usize]) -> Result<LabelMap> {
        let bytes = std::fs::read(path).map_err(|e| Tag2DcmError::io(path, e))?;
        self.decode(path, &bytes, expected_shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_bytes(header: &str, labels: &[u8]) -> Vec<u8> {
        let mut bytes = header.as_bytes().to_vec();
        bytes.push(TAG_HEADER_TERMINATOR);
        bytes.push(0);
        bytes.extend_from_slice(labels);
        bytes
    }

    #[test]
    fn decodes_payload_after_header() {
        let bytes = tag_bytes("x: 2\ny: 2\n", &[1, 2, 5, 7]);
        let map = TagFileReader
            .decode(Path::new("a.tag"), &bytes, &[2, 2])
            .expect("decode");
        assert_eq!(map.shape(), &[2, 2]);
        assert_eq!(
            map.values().iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 5, 7]
        );
    }

    #[test]
    fn high_byte_values_stay_unsigned() {
        let bytes = tag_bytes("h", &[255, 128]);
        let map = TagFileReader
            .decode(Path::new("a.tag"), &bytes, &[1, 2])
            .expect("decode");
        assert_eq!(
            map.values().iter().copied().collect::<Vec<_>>(),
            vec![255, 128]
        );
    }

    #[test]
    fn missing_terminator_is_a_format_error() {
        let err = TagFileReader
            .decode(Path::new("a.tag"), b"no terminator", &[1, 1])
            .unwrap_err();
        assert!(matches!(err, Tag2DcmError::Format { .. }));
    }

    #[test]
    fn wrong_payload_length_is_a_shape_mismatch() {
        let bytes = tag_bytes("h", &[0; 256 * 256]);
        let err = TagFileReader
            .decode(Path::new("a.tag"), &bytes, &[512, 512])
            .unwrap_err();
        assert!(matches!(err, Tag2DcmError::ShapeMismatch { .. }));
    }

    #[test]
    fn read_checked_rejects_reader_returning_other_shape() {
        let reader = |_: &Path, _: &[usize]| -> Result<LabelMap> {
            Ok(LabelMap::new(ArrayD::zeros(IxDyn(&[256, 256]))))
        };
        let err = read_checked(&reader, Path::new("a.tag"), &[512, 512]).unwrap_err();
        match err {
            Tag2DcmError::ShapeMismatch { expected, actual } => {
                assert_eq!(expected, vec![512, 512]);
                assert_eq!(actual, vec![256, 256]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
