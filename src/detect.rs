//
// detect.rs
// Tag2Dcm-rs
//
// File-type detection for DICOM and tag files, and companion tag file resolution.
//

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Result, Tag2DcmError};

pub const TAG_EXTENSION: &str = "tag";

const PREAMBLE_LEN: usize = 128;
const DICM_MAGIC: &[u8; 4] = b"DICM";

/// macOS resource-fork files (`._name`) are never treated as data.
fn is_resource_fork(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with("._"))
}

/// True for regular files carrying the `DICM` magic after the 128-byte preamble.
pub fn is_dicom_file(path: &Path) -> bool {
    if !path.is_file() || is_resource_fork(path) {
        return false;
    }
    let mut header = [0u8; PREAMBLE_LEN + 4];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map(|_| &header[PREAMBLE_LEN..] == DICM_MAGIC)
        .unwrap_or(false)
}

pub fn is_tag_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == TAG_EXTENSION) && !is_resource_fork(path)
}

/// Candidate companion paths, in resolution order:
/// `scan.dcm` -> `scan.tag`, then `scan.dcm.tag`.
pub fn companion_candidates(image: &Path) -> [PathBuf; 2] {
    let replaced = image.with_extension(TAG_EXTENSION);
    let mut appended = image.as_os_str().to_owned();
    appended.push(".");
    appended.push(TAG_EXTENSION);
    [replaced, PathBuf::from(appended)]
}

/// Resolve the tag file that belongs to `image`.
pub fn companion_tag_file(image: &Path) -> Result<PathBuf> {
    companion_candidates(image)
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Tag2DcmError::CompanionNotFound {
            image: image.to_path_buf(),
        })
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Validate an explicitly given image/tag pair.
///
/// Errors with `Format` when the image is not DICOM or the label file has no
/// `.tag` extension. Returns whether `tag` is the companion `image` would
/// resolve to on its own.
pub fn check_pair(image: &Path, tag: &Path) -> Result<bool> {
    if !is_dicom_file(image) {
        return Err(Tag2DcmError::format(image, "not a DICOM file"));
    }
    if !is_tag_file(tag) {
        return Err(Tag2DcmError::format(
            tag,
            format!("label file must have a .{TAG_EXTENSION} extension"),
        ));
    }
    Ok(companion_tag_file(image).map_or(false, |companion| same_path(&companion, tag)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn detects_dicom_magic() {
        let dir = tempdir().expect("tempdir");
        let good = dir.path().join("good.dcm");
        let mut bytes = vec![0u8; PREAMBLE_LEN];
        bytes.extend_from_slice(b"DICM rest of file");
        fs::write(&good, &bytes).expect("write");
        let short = dir.path().join("short.dcm");
        fs::write(&short, b"DICM").expect("write");
        let fork = dir.path().join("._good.dcm");
        fs::write(&fork, &bytes).expect("write");

        assert!(is_dicom_file(&good));
        assert!(!is_dicom_file(&short));
        assert!(!is_dicom_file(&fork));
        assert!(!is_dicom_file(dir.path()));
    }

    #[test]
    fn tag_file_extension() {
        assert!(is_tag_file(Path::new("data/10.tag")));
        assert!(!is_tag_file(Path::new("data/._10.tag")));
        assert!(!is_tag_file(Path::new("data/10.dcm")));
    }

    #[test]
    fn candidates_follow_both_conventions() {
        let [replaced, appended] = companion_candidates(Path::new("dir/scan.img"));
        assert_eq!(replaced, PathBuf::from("dir/scan.tag"));
        assert_eq!(appended, PathBuf::from("dir/scan.img.tag"));
    }

    #[test]
    fn prefers_replaced_extension() {
        let dir = tempdir().expect("tempdir");
        let image = dir.path().join("scan.img");
        fs::write(dir.path().join("scan.tag"), b"a").expect("write");
        fs::write(dir.path().join("scan.img.tag"), b"b").expect("write");
        assert_eq!(
            companion_tag_file(&image).expect("resolve"),
            dir.path().join("scan.tag")
        );
    }

    #[test]
    fn falls_back_to_appended_extension() {
        let dir = tempdir().expect("tempdir");
        let image = dir.path().join("scan.img");
        fs::write(dir.path().join("scan.img.tag"), b"b").expect("write");
        assert_eq!(
            companion_tag_file(&image).expect("resolve"),
            dir.path().join("scan.img.tag")
        );
    }

    fn fake_dicom(path: &Path) {
        let mut bytes = vec![0u8; PREAMBLE_LEN];
        bytes.extend_from_slice(DICM_MAGIC);
        fs::write(path, bytes).expect("write");
    }

    #[test]
    fn explicit_pairs_are_validated() {
        let dir = tempdir().expect("tempdir");
        let image = dir.path().join("scan.dcm");
        fake_dicom(&image);
        let own = dir.path().join("scan.tag");
        let other = dir.path().join("other.tag");
        let wrong_ext = dir.path().join("scan.raw");
        for path in [&own, &other, &wrong_ext] {
            fs::write(path, b"x").expect("write");
        }

        assert!(check_pair(&image, &own).expect("own companion"));
        assert!(!check_pair(&image, &other).expect("foreign tag"));
        assert!(matches!(
            check_pair(&image, &wrong_ext),
            Err(Tag2DcmError::Format { .. })
        ));
        assert!(matches!(
            check_pair(&own, &own),
            Err(Tag2DcmError::Format { .. })
        ));
    }

    #[test]
    fn missing_companion_names_the_image() {
        let dir = tempdir().expect("tempdir");
        let image = dir.path().join("scan.img");
        match companion_tag_file(&image) {
            Err(Tag2DcmError::CompanionNotFound { image: reported }) => {
                assert_eq!(reported, image)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
