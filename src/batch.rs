//
// batch.rs
// Tag2Dcm-rs
//
// Walks a directory tree and composites every DICOM image that has a companion tag file, in parallel.
//

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

use crate::config::Tag2DcmOptions;
use crate::error::Tag2DcmError;
use crate::models::{BatchFailure, BatchSummary};
use crate::{detect, pipeline};

/// DICOM files under `dir`, sorted so runs are reproducible.
pub fn dicom_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| detect::is_dicom_file(p))
        .collect();
    files.sort();
    files
}

/// Run the pipeline for every DICOM file with a companion tag file.
///
/// Items are independent: a failing file is recorded and the rest continue.
/// Every item writes into `options.output_dir`, so input file names must be
/// unique across the tree.
pub fn process_directory(dir: &Path, options: &Tag2DcmOptions) -> BatchSummary {
    let files = dicom_files(dir);
    info!(?dir, count = files.len(), "Found DICOM files");

    let results: Vec<_> = files
        .par_iter()
        .map(|image| (image, pipeline::run_with_companion(image, options)))
        .collect();

    let mut summary = BatchSummary::default();
    for (image, result) in results {
        match result {
            Ok(artifacts) => summary.succeeded.push(artifacts),
            Err(Tag2DcmError::CompanionNotFound { .. }) => summary.skipped.push(image.clone()),
            Err(e) => {
                error!(?image, %e, "Compositing failed");
                summary.failed.push(BatchFailure {
                    image: image.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    summary
}
