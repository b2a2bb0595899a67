//
// pipeline.rs
// Tag2Dcm-rs
//
// Load -> read labels -> composite -> encode, aborting on the first failure.
//

use std::path::Path;

use tracing::{info, warn};

use crate::composite::composite;
use crate::config::Tag2DcmOptions;
use crate::error::Result;
use crate::labels::{self, LabelReader, TagFileReader};
use crate::models::OutputArtifactSet;
use crate::palette::PALETTE;
use crate::{detect, encode, loader};

/// Run the compositing pipeline for one image/label pair.
pub fn run(
    image: &Path,
    label: &Path,
    options: &Tag2DcmOptions,
    reader: &dyn LabelReader,
) -> Result<OutputArtifactSet> {
    info!(?image, ?label, "Compositing tag overlay");

    let source = loader::load(image)?;
    let labels = labels::read_checked(reader, label, source.shape())?;

    let composite = composite(&labels, &PALETTE);
    if composite.anomalies() > 0 {
        warn!(
            ?label,
            count = composite.anomalies(),
            "Labels outside the palette rendered black"
        );
    }

    encode::write_artifacts(&source, label, &composite, options)
}

/// Like [`run`], resolving the companion `.tag` file next to `image`.
pub fn run_with_companion(image: &Path, options: &Tag2DcmOptions) -> Result<OutputArtifactSet> {
    let label = detect::companion_tag_file(image)?;
    run(image, &label, options, &TagFileReader)
}
