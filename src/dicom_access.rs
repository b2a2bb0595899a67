use std::str::FromStr;

use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

/// Small helper trait to pull typed values from different DICOM object shapes.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;

    /// Parses the first value of a (possibly multi-valued) element.
    ///
    /// `None` when the element is absent or empty, `Some(Err(text))` when it
    /// is present but does not parse.
    fn parse_element<T: FromStr>(&self, tag: Tag) -> Option<Result<T, String>> {
        let text = self.element_str(tag)?;
        let first = text.split('\\').next().unwrap_or_default().trim();
        if first.is_empty() {
            return None;
        }
        Some(first.parse::<T>().map_err(|_| first.to_string()))
    }
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
    }
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
    }
}
