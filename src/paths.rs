//
// paths.rs
// Tag2Dcm-rs
//
// Pure output-path derivation plus the output directory guard.
//

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, Tag2DcmError};

/// Appended to the label file name for the composite object.
pub const COMPOSITE_SUFFIX: &str = ".dcm";
/// Appended to a DICOM file name for its PNG rendering.
pub const PNG_SUFFIX: &str = ".png";

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}

/// `<output_dir>/<label file name>.dcm`
pub fn composite_dcm_path(output_dir: &Path, label: &Path) -> PathBuf {
    output_dir.join(format!("{}{}", file_name(label), COMPOSITE_SUFFIX))
}

/// `<output_dir>/<file name>.png`
pub fn png_path(output_dir: &Path, dicom: &Path) -> PathBuf {
    output_dir.join(format!("{}{}", file_name(dicom), PNG_SUFFIX))
}

/// Destination of a verbatim copy: same file name inside `output_dir`.
pub fn copy_path(output_dir: &Path, source: &Path) -> PathBuf {
    output_dir.join(file_name(source))
}

/// `dir/scan.dcm` -> `dir/scan_raw.dcm`
pub fn raw_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_raw.{}", stem, ext.to_string_lossy()),
        None => format!("{}_raw", stem),
    };
    path.with_file_name(name)
}

/// Create `dir` (with parents) unless it already exists as a directory.
/// Returns whether this call created it.
pub fn ensure_output_dir(dir: &Path) -> Result<bool> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(false),
        Ok(_) => Err(Tag2DcmError::DirectoryConflict(dir.to_path_buf())),
        Err(_) => match fs::create_dir_all(dir) {
            Ok(()) => Ok(true),
            // Lost a race: someone else created something at this path.
            Err(_) if dir.exists() && !dir.is_dir() => {
                Err(Tag2DcmError::DirectoryConflict(dir.to_path_buf()))
            }
            Err(e) => Err(Tag2DcmError::io(dir, e)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn derived_names() {
        let out = Path::new("out");
        assert_eq!(
            composite_dcm_path(out, Path::new("data/10.tag")),
            PathBuf::from("out/10.tag.dcm")
        );
        assert_eq!(
            png_path(out, Path::new("data/10.dcm")),
            PathBuf::from("out/10.dcm.png")
        );
        assert_eq!(
            png_path(out, &composite_dcm_path(out, Path::new("data/10.tag"))),
            PathBuf::from("out/10.tag.dcm.png")
        );
        assert_eq!(
            copy_path(out, Path::new("/abs/data/10.dcm")),
            PathBuf::from("out/10.dcm")
        );
    }

    #[test]
    fn raw_path_inserts_suffix_before_extension() {
        assert_eq!(
            raw_path(Path::new("d/scan.dcm")),
            PathBuf::from("d/scan_raw.dcm")
        );
        assert_eq!(raw_path(Path::new("d/IM_1")), PathBuf::from("d/IM_1_raw"));
    }

    #[test]
    fn output_dir_is_created_once_and_reused() {
        let root = tempdir().expect("tempdir");
        let nested = root.path().join("a").join("b");
        assert!(ensure_output_dir(&nested).expect("create"));
        assert!(nested.is_dir());
        assert!(!ensure_output_dir(&nested).expect("idempotent"));
    }

    #[test]
    fn file_in_the_way_is_a_conflict() {
        let root = tempdir().expect("tempdir");
        let blocker = root.path().join("out");
        fs::write(&blocker, b"x").expect("write");
        assert!(matches!(
            ensure_output_dir(&blocker),
            Err(Tag2DcmError::DirectoryConflict(_))
        ));
    }
}
