//
// explorer.rs
// Tag2Dcm-rs
//
// Loads DICOM files from disk and answers header, dictionary, tag-value and pixel-decodability queries over them.
//

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use dicom::core::dictionary::DataDictionary;
use dicom::core::value::Value;
use dicom::core::{PrimitiveValue, Tag};
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{open_file, InMemDicomObject};
use dicom::pixeldata::PixelDecoder;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::dicom_access::ElementAccess;
use crate::error::{Result, Tag2DcmError};
use crate::models::{PixelCheckFailure, TagValues};
use crate::{batch, detect, loader};

const MAX_VALUE_LEN: usize = 64;

/// A set of DICOM files under inspection.
#[derive(Debug, Default)]
pub struct Explorer {
    files: Vec<PathBuf>,
}

impl Explorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Adds `path` if it is a DICOM file; returns whether it was added.
    pub fn load_file(&mut self, path: &Path) -> bool {
        if detect::is_dicom_file(path) {
            self.files.push(path.to_path_buf());
            true
        } else {
            debug!(?path, "Not a DICOM file, skipping");
            false
        }
    }

    /// Recursively adds every DICOM file below `dir`; returns how many were added.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(Tag2DcmError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }
        let found = batch::dicom_files(dir);
        let count = found.len();
        self.files.extend(found);
        Ok(count)
    }

    /// Value of the element named `keyword` in each loaded file that has it.
    pub fn tag_values(&self, keyword: &str) -> Result<TagValues> {
        let tag = tag_for_keyword(keyword)
            .ok_or_else(|| Tag2DcmError::Metadata(format!("unknown attribute {keyword:?}")))?;

        let values = self
            .files
            .par_iter()
            .filter_map(|file| match open_file(file) {
                Ok(obj) => obj.element_str(tag).map(|v| (file.clone(), v)),
                Err(e) => {
                    warn!(?file, %e, "Cannot open file");
                    None
                }
            })
            .collect::<BTreeMap<_, _>>();

        Ok(TagValues {
            keyword: keyword.to_string(),
            tag: format_tag(tag),
            values,
        })
    }

    /// Files whose pixel data cannot be decoded, typically unsupported compression.
    pub fn check_pixels(&self) -> Vec<PixelCheckFailure> {
        let mut failures: Vec<_> = self
            .files
            .par_iter()
            .filter_map(|file| {
                pixel_error(file).map(|error| PixelCheckFailure {
                    file: file.clone(),
                    error,
                })
            })
            .collect();
        failures.sort_by(|a, b| a.file.cmp(&b.file));
        failures
    }
}

fn pixel_error(file: &Path) -> Option<String> {
    let obj = match open_file(file) {
        Ok(obj) => obj,
        Err(e) => return Some(e.to_string()),
    };
    let error = obj.decode_pixel_data().err().map(|e| e.to_string());
    error
}

/// Resolve an attribute keyword such as `PatientID` through the standard dictionary.
pub fn tag_for_keyword(keyword: &str) -> Option<Tag> {
    StandardDataDictionary
        .by_name(keyword.trim())
        .map(|entry| entry.tag.inner())
}

/// Textual dump of the header (everything but pixel data) with dictionary names.
pub fn header_dump(path: &Path) -> Result<String> {
    let obj = loader::open_dicom(path)?;

    let mut out = String::new();
    let meta = obj.meta();
    let _ = writeln!(out, "Transfer Syntax: {}", meta.transfer_syntax());
    let _ = writeln!(
        out,
        "Media Storage SOP Class UID: {}",
        meta.media_storage_sop_class_uid
    );
    dump_object(&obj, 0, &mut out);
    Ok(out)
}

fn dump_object(obj: &InMemDicomObject<StandardDataDictionary>, depth: usize, out: &mut String) {
    for elem in obj.iter() {
        let tag = elem.header().tag;
        if tag == tags::PIXEL_DATA {
            continue;
        }
        let vr = elem.header().vr;
        let indent = "  ".repeat(depth);
        let head = format!("{}{} {} {}", indent, format_tag(tag), tag_name(tag), vr);

        match elem.value() {
            Value::Primitive(p) => {
                let _ = writeln!(out, "{} {}", head, preview_primitive(p));
            }
            Value::Sequence(seq) => {
                let _ = writeln!(out, "{} [{} item(s)]", head, seq.items().len());
                for item in seq.items() {
                    dump_object(item, depth + 1, out);
                }
            }
            Value::PixelSequence(p) => {
                let _ = writeln!(out, "{} [{} fragment(s)]", head, p.fragments().len());
            }
        }
    }
}

fn preview_primitive(value: &PrimitiveValue) -> String {
    let text = value.to_str();
    if text.is_empty() {
        return format!("{} bytes", value.to_bytes().len());
    }
    if text.chars().count() <= MAX_VALUE_LEN {
        text.into_owned()
    } else {
        let mut truncated: String = text.chars().take(MAX_VALUE_LEN).collect();
        truncated.push('…');
        truncated
    }
}

pub fn format_tag(tag: Tag) -> String {
    format!("({:04X},{:04X})", tag.group(), tag.element())
}

fn tag_name(tag: Tag) -> String {
    StandardDataDictionary
        .by_tag(tag)
        .map(|e| e.alias.to_string())
        .unwrap_or_else(|| "UnknownTag".to_string())
}
