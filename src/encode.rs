//
// encode.rs
// Tag2Dcm-rs
//
// Re-encodes a composite RGB image as a new DICOM instance cloned from the source, and writes the output artifact set.
//

use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{DefaultDicomObject, FileDicomObject, FileMetaTableBuilder};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::composite::CompositeImage;
use crate::config::Tag2DcmOptions;
use crate::dicom_access::ElementAccess;
use crate::error::{Result, Tag2DcmError};
use crate::loader::SourceImage;
use crate::models::OutputArtifactSet;
use crate::window::WindowSpec;
use crate::{paths, render};

/// Appended to the source SOP Instance UID to identify the composite.
pub const INSTANCE_UID_SUFFIX: &str = ".9999";

const MAX_UID_LEN: usize = 64;

/// `<original>.9999`, validated as a DICOM UID.
pub fn derive_instance_uid(original: &str) -> Result<String> {
    let original = original.trim_end_matches(['\0', ' ']);
    if original.is_empty() || !original.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(Tag2DcmError::Metadata(format!(
            "SOP Instance UID {original:?} is not a valid UID"
        )));
    }
    let derived = format!("{original}{INSTANCE_UID_SUFFIX}");
    if derived.len() > MAX_UID_LEN {
        return Err(Tag2DcmError::Metadata(format!(
            "derived SOP Instance UID {derived} exceeds {MAX_UID_LEN} characters"
        )));
    }
    Ok(derived)
}

fn required_str(obj: &DefaultDicomObject, tag: Tag, name: &str) -> Result<String> {
    obj.element_str(tag)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Tag2DcmError::Metadata(format!("missing {name} {tag}")))
}

fn required_usize(obj: &DefaultDicomObject, tag: Tag, name: &str) -> Result<usize> {
    match obj.parse_element::<usize>(tag) {
        Some(Ok(v)) => Ok(v),
        Some(Err(text)) => Err(Tag2DcmError::Metadata(format!(
            "malformed {name} {tag}: {text:?}"
        ))),
        None => Err(Tag2DcmError::Metadata(format!("missing {name} {tag}"))),
    }
}

fn check_dimension(name: &str, declared: usize, actual: usize) -> Result<()> {
    if declared != actual {
        return Err(Tag2DcmError::Metadata(format!(
            "{name} is {declared} but the composite has {actual}"
        )));
    }
    Ok(())
}

/// Clone every element of `original` and rewrite the pixel module for 8-bit RGB.
pub fn build_rgb_object(
    original: &DefaultDicomObject,
    composite: &CompositeImage,
) -> Result<DefaultDicomObject> {
    let sop_class_uid = required_str(original, tags::SOP_CLASS_UID, "SOP Class UID")?;
    let sop_instance_uid = required_str(original, tags::SOP_INSTANCE_UID, "SOP Instance UID")?;
    let rows = required_usize(original, tags::ROWS, "Rows")?;
    let columns = required_usize(original, tags::COLUMNS, "Columns")?;

    match composite.spatial_shape() {
        &[r, c] => {
            check_dimension("Rows", rows, r)?;
            check_dimension("Columns", columns, c)?;
        }
        &[f, r, c] => {
            let frames = required_usize(original, tags::NUMBER_OF_FRAMES, "Number of Frames")?;
            check_dimension("Number of Frames", frames, f)?;
            check_dimension("Rows", rows, r)?;
            check_dimension("Columns", columns, c)?;
        }
        other => {
            return Err(Tag2DcmError::Metadata(format!(
                "unsupported composite shape {other:?}"
            )))
        }
    }

    let new_uid = derive_instance_uid(&sop_instance_uid)?;

    let file_meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid(sop_class_uid.as_str())
        .media_storage_sop_instance_uid(new_uid.as_str())
        .build()
        .map_err(|e| Tag2DcmError::Metadata(format!("cannot build file meta group: {e}")))?;

    let mut obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, file_meta);
    for elem in original.iter() {
        obj.put(elem.clone());
    }

    let mut pixel_bytes = composite.to_interleaved_bytes();
    // Element values must have even length.
    if pixel_bytes.len() % 2 == 1 {
        pixel_bytes.push(0);
    }

    let us = |tag: Tag, value: u16| DataElement::new(tag, VR::US, PrimitiveValue::from(value));
    obj.put(DataElement::new(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        PrimitiveValue::from("RGB"),
    ));
    obj.put(us(tags::SAMPLES_PER_PIXEL, 3));
    obj.put(us(tags::BITS_ALLOCATED, 8));
    obj.put(us(tags::BITS_STORED, 8));
    obj.put(us(tags::HIGH_BIT, 7));
    obj.put(us(tags::PLANAR_CONFIGURATION, 0));
    obj.put(us(tags::PIXEL_REPRESENTATION, 0));
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(new_uid.as_str()),
    ));
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PrimitiveValue::from(pixel_bytes),
    ));

    debug!(sop_instance_uid = %new_uid, "Built RGB composite object");
    Ok(obj)
}

enum Staged {
    Bytes(Vec<u8>),
    Copy(PathBuf),
}

/// Write staged files in order.
///
/// On failure, files written so far are removed, along with `created_dir`
/// when this run created the output directory. A file that replaced an
/// earlier output is removed too; the earlier version is not restored.
fn commit(staged: Vec<(PathBuf, Staged)>, created_dir: Option<&Path>) -> Result<()> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (target, content) in staged {
        let result = match content {
            Staged::Bytes(bytes) => fs::write(&target, bytes),
            Staged::Copy(source) => {
                if same_file(&source, &target) {
                    debug!(?target, "Source already in output directory, not copying");
                    continue;
                }
                fs::copy(&source, &target).map(|_| ())
            }
        };
        if let Err(e) = result {
            for path in &written {
                if let Err(cleanup) = fs::remove_file(path) {
                    warn!(?path, %cleanup, "Could not remove partial artifact");
                }
            }
            if let Some(dir) = created_dir {
                if let Err(cleanup) = fs::remove_dir(dir) {
                    warn!(?dir, %cleanup, "Could not remove output directory");
                }
            }
            return Err(Tag2DcmError::io(target, e));
        }
        written.push(target);
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Encode the composite and write every requested artifact into `options.output_dir`.
///
/// All fallible in-memory work happens before the first write, so a metadata
/// or encoding failure leaves the output directory untouched. Existing files
/// at the derived paths are overwritten.
pub fn write_artifacts(
    source: &SourceImage,
    label_path: &Path,
    composite: &CompositeImage,
    options: &Tag2DcmOptions,
) -> Result<OutputArtifactSet> {
    let obj = build_rgb_object(source.object(), composite)?;
    let sop_instance_uid = obj
        .element_str(tags::SOP_INSTANCE_UID)
        .unwrap_or_default();

    let mut dcm_bytes = Vec::new();
    obj.write_all(&mut dcm_bytes)
        .map_err(|e| Tag2DcmError::Metadata(format!("cannot serialize composite: {e}")))?;

    let pixel_sha256 = hex::encode(Sha256::digest(composite.to_interleaved_bytes()));

    let output_dir = options.output_dir.as_path();
    let composite_dcm = paths::composite_dcm_path(output_dir, label_path);
    let mut staged = vec![(composite_dcm.clone(), Staged::Bytes(dcm_bytes))];

    let source_copy = options
        .copy_source_image
        .then(|| paths::copy_path(output_dir, source.path()));
    if let Some(target) = &source_copy {
        staged.push((target.clone(), Staged::Copy(source.path().to_path_buf())));
    }
    let label_copy = options
        .copy_label_file
        .then(|| paths::copy_path(output_dir, label_path));
    if let Some(target) = &label_copy {
        staged.push((target.clone(), Staged::Copy(label_path.to_path_buf())));
    }

    let (source_png, composite_png) = if options.render_pngs {
        let gray = render::grayscale_image(&source.normalized(WindowSpec::SOFT_TISSUE));
        let gray_png = render::png_bytes(DynamicImage::ImageLuma8(gray), options.png_figure_size)?;
        let rgb_png = render::png_bytes(
            DynamicImage::ImageRgb8(render::rgb_image(composite)),
            options.png_figure_size,
        )?;
        let source_png = paths::png_path(output_dir, source.path());
        let composite_png = paths::png_path(output_dir, &composite_dcm);
        staged.push((source_png.clone(), Staged::Bytes(gray_png)));
        staged.push((composite_png.clone(), Staged::Bytes(rgb_png)));
        (Some(source_png), Some(composite_png))
    } else {
        (None, None)
    };

    let created = paths::ensure_output_dir(output_dir)?;
    commit(staged, created.then_some(output_dir))?;

    info!(output = ?composite_dcm, %sop_instance_uid, "Wrote composite DICOM");
    Ok(OutputArtifactSet {
        composite_dcm,
        source_copy,
        label_copy,
        source_png,
        composite_png,
        sop_instance_uid,
        pixel_sha256,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn failed_commit_removes_partial_output_and_created_dir() {
        let root = tempdir().expect("tempdir");
        let out = root.path().join("out");
        assert!(paths::ensure_output_dir(&out).expect("create"));

        let staged = vec![
            (out.join("first.dcm"), Staged::Bytes(vec![1, 2])),
            (
                out.join("copy.dcm"),
                Staged::Copy(root.path().join("vanished.dcm")),
            ),
        ];
        let err = commit(staged, Some(&out)).unwrap_err();
        assert!(matches!(err, Tag2DcmError::Io { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn failed_commit_keeps_existing_dir() {
        let root = tempdir().expect("tempdir");
        let staged = vec![
            (root.path().join("first.dcm"), Staged::Bytes(vec![1, 2])),
            (
                root.path().join("copy.dcm"),
                Staged::Copy(root.path().join("vanished.dcm")),
            ),
        ];
        assert!(commit(staged, None).is_err());
        assert!(root.path().is_dir());
        assert!(!root.path().join("first.dcm").exists());
    }

    #[rstest]
    #[case("1.2.3", "1.2.3.9999")]
    #[case("1.2.826.0.1.3680043.2.1125.1\0", "1.2.826.0.1.3680043.2.1125.1.9999")]
    fn derives_suffixed_uid(#[case] original: &str, #[case] expected: &str) {
        let derived = derive_instance_uid(original).expect("derive");
        assert_eq!(derived, expected);
        assert_ne!(derived, original);
    }

    #[rstest]
    #[case("")]
    #[case("1.2.abc")]
    #[case("1.2.840.113619.2.55.3.604688119.969.1234567890.123.456789.12")]
    fn rejects_invalid_or_overlong_uids(#[case] original: &str) {
        assert!(matches!(
            derive_instance_uid(original),
            Err(Tag2DcmError::Metadata(_))
        ));
    }
}
