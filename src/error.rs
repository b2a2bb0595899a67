//
// error.rs
// Tag2Dcm-rs
//
// Error taxonomy shared by the loader, label readers, re-encoder and the supporting utilities.
//

use std::path::PathBuf;

use thiserror::Error;

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Tag2DcmError>;

/// Every failure is terminal for the invocation that raised it.
#[derive(Error, Debug)]
pub enum Tag2DcmError {
    /// Path missing or unreadable, or a write failed.
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input is not a valid, decodable image (or label file).
    #[error("Invalid format in {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// No label file next to the image under either naming convention.
    #[error("No companion tag file found for {image:?}")]
    CompanionNotFound { image: PathBuf },

    /// Label array shape differs from the image shape.
    #[error("Label map shape {actual:?} does not match image shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A field required to re-encode the image is absent or invalid.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Output path is occupied by something that is not a directory.
    #[error("Output path {0:?} exists and is not a directory")]
    DirectoryConflict(PathBuf),

    #[error("Invalid window (width {width}, level {level}): width must be positive")]
    InvalidWindow { width: f64, level: f64 },

    /// PNG encoding failed.
    #[error("Render error: {0}")]
    Render(#[from] image::ImageError),

    /// gdcmconv missing, failing or timing out.
    #[error("External tool error: {0}")]
    ExternalTool(String),
}

impl Tag2DcmError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Tag2DcmError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Tag2DcmError::Format {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
