//
// config.rs
// Tag2Dcm-rs
//
// Immutable options value for one compositing run, optionally loaded from JSON.
//

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, Tag2DcmError};
use crate::render::FigureSize;

/// Everything a pipeline invocation can be told, fixed before it starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag2DcmOptions {
    pub output_dir: PathBuf,
    /// Copy the source DICOM verbatim into `output_dir`.
    pub copy_source_image: bool,
    /// Copy the tag file verbatim into `output_dir`.
    pub copy_label_file: bool,
    pub render_pngs: bool,
    pub png_figure_size: FigureSize,
}

impl Default for Tag2DcmOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            copy_source_image: false,
            copy_label_file: false,
            render_pngs: false,
            png_figure_size: FigureSize::default(),
        }
    }
}

impl Tag2DcmOptions {
    /// Missing keys fall back to their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Tag2DcmError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| Tag2DcmError::format(path, e))
    }
}
