//
// models.rs
// Tag2Dcm-rs
//
// Defines serializable reports for pipeline artifacts, batch runs, and explorer checks.
//

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Files produced by one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifactSet {
    pub composite_dcm: PathBuf,
    pub source_copy: Option<PathBuf>,
    pub label_copy: Option<PathBuf>,
    pub source_png: Option<PathBuf>,
    pub composite_png: Option<PathBuf>,
    /// SOP Instance UID assigned to the composite object.
    pub sop_instance_uid: String,
    /// SHA-256 of the composite pixel bytes, hex encoded.
    pub pixel_sha256: String,
}

impl OutputArtifactSet {
    pub fn files(&self) -> Vec<&PathBuf> {
        std::iter::once(&self.composite_dcm)
            .chain(self.source_copy.iter())
            .chain(self.label_copy.iter())
            .chain(self.source_png.iter())
            .chain(self.composite_png.iter())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub image: PathBuf,
    pub error: String,
}

/// Outcome of a directory run; one failure never hides the others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: Vec<OutputArtifactSet>,
    pub failed: Vec<BatchFailure>,
    /// DICOM files skipped because no tag file sits next to them.
    pub skipped: Vec<PathBuf>,
}

/// Values of one element across the loaded files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagValues {
    pub keyword: String,
    pub tag: String,
    pub values: BTreeMap<PathBuf, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelCheckFailure {
    pub file: PathBuf,
    pub error: String,
}
