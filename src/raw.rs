//
// raw.rs
// Tag2Dcm-rs
//
// Recompresses DICOM files to raw through the external gdcmconv tool, bounded by a timeout.
//

//! Lossy-to-raw recompression through the external `gdcmconv` tool.
//!
//! Some encapsulated transfer syntaxes cannot be decoded in-process; running
//! `gdcmconv --raw` first yields an uncompressed copy the loader can read.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, Tag2DcmError};
use crate::paths;

pub const GDCMCONV: &str = "gdcmconv";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Check if gdcmconv can be executed.
pub async fn gdcmconv_available() -> bool {
    Command::new(GDCMCONV)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run `gdcmconv --raw input output`, bounded by `timeout`.
pub async fn convert_file(input: &Path, output: &Path, timeout: Duration) -> Result<()> {
    let mut command = Command::new(GDCMCONV);
    command
        .arg("--raw")
        .arg(input)
        .arg(output)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let result = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| {
            Tag2DcmError::ExternalTool(format!(
                "{GDCMCONV} timed out after {}s on {input:?}",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| Tag2DcmError::ExternalTool(format!("cannot run {GDCMCONV}: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(Tag2DcmError::ExternalTool(format!(
            "{GDCMCONV} failed on {input:?} ({}): {}",
            result.status,
            stderr.trim()
        )));
    }
    debug!(?input, ?output, "Converted to raw");
    Ok(())
}

/// Convert one file next to itself as `<stem>_raw.<ext>`.
pub async fn to_raw_file(input: &Path, timeout: Duration) -> Result<PathBuf> {
    ensure_tool().await?;
    let output = paths::raw_path(input);
    convert_file(input, &output, timeout).await?;
    Ok(output)
}

/// Convert every file into a fresh `output_dir`, keeping file names.
///
/// The directory must not exist yet, so a previous conversion is never mixed
/// with a new one.
pub async fn to_raw(
    files: &[PathBuf],
    output_dir: &Path,
    timeout: Duration,
) -> Result<Vec<PathBuf>> {
    if output_dir.exists() {
        return Err(Tag2DcmError::DirectoryConflict(output_dir.to_path_buf()));
    }
    ensure_tool().await?;
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Tag2DcmError::io(output_dir, e))?;

    let mut converted = Vec::with_capacity(files.len());
    for file in files {
        let target = paths::copy_path(output_dir, file);
        convert_file(file, &target, timeout).await?;
        info!(?file, "Converted");
        converted.push(target);
    }
    Ok(converted)
}

async fn ensure_tool() -> Result<()> {
    if gdcmconv_available().await {
        Ok(())
    } else {
        Err(Tag2DcmError::ExternalTool(format!(
            "Tool \"{GDCMCONV}\" is not installed"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn existing_output_dir_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("scan.dcm");
        std::fs::write(&input, b"untouched").expect("write");
        let err = to_raw(&[input.clone()], dir.path(), DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Tag2DcmError::DirectoryConflict(_)));
        assert_eq!(std::fs::read(&input).expect("read"), b"untouched");
    }

    #[tokio::test]
    async fn file_in_place_of_output_dir_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("raw");
        std::fs::write(&blocker, b"x").expect("write");
        let err = to_raw(&[], &blocker, DEFAULT_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Tag2DcmError::DirectoryConflict(_)));
    }

    #[tokio::test]
    async fn missing_input_is_reported_as_tool_error() {
        if !gdcmconv_available().await {
            return;
        }
        let dir = tempdir().expect("tempdir");
        let err = convert_file(
            &dir.path().join("missing.dcm"),
            &dir.path().join("out.dcm"),
            DEFAULT_TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Tag2DcmError::ExternalTool(_)));
    }
}
