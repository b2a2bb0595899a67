//
// loader.rs
// Tag2Dcm-rs
//
// Reads a CT DICOM image, decodes (and decompresses) its pixel data, and applies the rescale slope/intercept.
//

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use dicom::core::value::Value;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use dicom::pixeldata::PixelDecoder;
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelRepresentation, VoiLutOption};
use ndarray::{Array, ArrayD, IxDyn};
use tracing::debug;

use crate::dicom_access::ElementAccess;
use crate::error::{Result, Tag2DcmError};
use crate::window::WindowSpec;

/// A decoded grayscale image in physical intensity units, together with the
/// DICOM object it came from.
#[derive(Debug)]
pub struct SourceImage {
    path: PathBuf,
    object: DefaultDicomObject,
    intensities: ArrayD<f64>,
    rescale_slope: f64,
    rescale_intercept: f64,
    compressed: bool,
}

impl SourceImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed DICOM object, including its original metadata.
    pub fn object(&self) -> &DefaultDicomObject {
        &self.object
    }

    /// Rescaled intensities: `[rows, cols]`, or `[frames, rows, cols]` for multi-frame images.
    pub fn intensities(&self) -> &ArrayD<f64> {
        &self.intensities
    }

    pub fn shape(&self) -> &[usize] {
        self.intensities.shape()
    }

    pub fn rescale_slope(&self) -> f64 {
        self.rescale_slope
    }

    pub fn rescale_intercept(&self) -> f64 {
        self.rescale_intercept
    }

    /// Whether the stored pixel data was encapsulated (compressed) on disk.
    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// Windowed intensities, every value within [0, 1].
    pub fn normalized(&self, window: WindowSpec) -> ArrayD<f64> {
        window.apply_array(&self.intensities)
    }
}

/// Open a DICOM file. A path that cannot be read as a regular file is an
/// `Io` error; content that does not parse is a `Format` error.
pub fn open_dicom(path: &Path) -> Result<DefaultDicomObject> {
    let file = File::open(path).map_err(|e| Tag2DcmError::io(path, e))?;
    let meta = file.metadata().map_err(|e| Tag2DcmError::io(path, e))?;
    if !meta.is_file() {
        return Err(Tag2DcmError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    drop(file);
    open_file(path).map_err(|e| Tag2DcmError::format(path, e))
}

/// Load a CT image and convert its stored samples to physical intensities.
pub fn load(path: &Path) -> Result<SourceImage> {
    let object = open_dicom(path)?;

    let compressed = object
        .element(tags::PIXEL_DATA)
        .map(|e| matches!(e.value(), Value::PixelSequence(_)))
        .map_err(|_| Tag2DcmError::format(path, "missing Pixel Data"))?;

    let rescale_slope = rescale_value(&object, path, tags::RESCALE_SLOPE, 1.0)?;
    let rescale_intercept = rescale_value(&object, path, tags::RESCALE_INTERCEPT, 0.0)?;

    let raw = decode_samples(&object, path)?;
    let intensities = raw.mapv(|v| v * rescale_slope + rescale_intercept);

    debug!(
        ?path,
        shape = ?intensities.shape(),
        rescale_slope,
        rescale_intercept,
        compressed,
        "Loaded source image"
    );

    Ok(SourceImage {
        path: path.to_path_buf(),
        object,
        intensities,
        rescale_slope,
        rescale_intercept,
        compressed,
    })
}

fn rescale_value(
    object: &DefaultDicomObject,
    path: &Path,
    tag: dicom::core::Tag,
    default: f64,
) -> Result<f64> {
    match object.parse_element::<f64>(tag) {
        None => Ok(default),
        Some(Ok(v)) if v.is_finite() => Ok(v),
        Some(Ok(v)) => Err(Tag2DcmError::format(
            path,
            format!("non-finite rescale value {v} in {tag}"),
        )),
        Some(Err(text)) => Err(Tag2DcmError::format(
            path,
            format!("malformed rescale value {text:?} in {tag}"),
        )),
    }
}

/// Decode the stored samples without any LUT so the rescale is applied exactly once.
fn decode_samples(object: &DefaultDicomObject, path: &Path) -> Result<ArrayD<f64>> {
    // Decompression happens here for encapsulated transfer syntaxes.
    let decoded = object
        .decode_pixel_data()
        .map_err(|e| Tag2DcmError::format(path, format!("failed to decode pixel data: {e}")))?;

    if decoded.samples_per_pixel() != 1 {
        return Err(Tag2DcmError::format(
            path,
            format!(
                "expected a grayscale image, found {} samples per pixel",
                decoded.samples_per_pixel()
            ),
        ));
    }

    let frames = decoded.number_of_frames() as usize;
    let rows = decoded.rows() as usize;
    let columns = decoded.columns() as usize;

    let convert_options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);
    let convert_err = |e: dicom_pixeldata::Error| {
        Tag2DcmError::format(path, format!("failed to read samples: {e}"))
    };
    let values: Vec<f64> = if decoded.pixel_representation() == PixelRepresentation::Signed {
        decoded
            .to_vec_with_options::<i32>(&convert_options)
            .map_err(convert_err)?
            .into_iter()
            .map(f64::from)
            .collect()
    } else {
        decoded
            .to_vec_with_options::<u32>(&convert_options)
            .map_err(convert_err)?
            .into_iter()
            .map(f64::from)
            .collect()
    };

    let shape = if frames > 1 {
        vec![frames, rows, columns]
    } else {
        vec![rows, columns]
    };
    Array::from_shape_vec(IxDyn(&shape), values).map_err(|e| {
        Tag2DcmError::format(path, format!("pixel data does not fill {shape:?}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unreadable_paths_are_io_errors() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(load(dir.path()), Err(Tag2DcmError::Io { .. })));
        assert!(matches!(
            load(&dir.path().join("absent.dcm")),
            Err(Tag2DcmError::Io { .. })
        ));
    }

    #[test]
    fn unparsable_content_is_a_format_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"hello").expect("write");
        assert!(matches!(
            open_dicom(&path),
            Err(Tag2DcmError::Format { .. })
        ));
    }
}
