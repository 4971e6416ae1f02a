//! Extraction of listing data from third-party payloads.
//!
//! Search pages embed their state as JSON in a script tag; detail responses
//! are raw JSON. Both schemas are undocumented and drift over time, so every
//! read goes through [`json_path`] and every field has an ordered chain of
//! known locations, newest schema first.

pub mod detail;
pub mod json_path;
pub mod script;
pub mod search;

use std::fmt;

pub use detail::{extract_detail, DetailExtraction};
pub use script::{extract_script_json, parse_json_body, DEFAULT_SCRIPT_TAG};
pub use search::{extract_cursors, extract_search_page, SearchPage, SearchResultShape};

/// A field that could not be found in a payload.
///
/// Not an error: the field keeps its default and the record is still emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionGap {
    pub listing_id: String,
    pub field: &'static str,
}

impl ExtractionGap {
    pub fn new(listing_id: &str, field: &'static str) -> Self {
        Self {
            listing_id: listing_id.to_string(),
            field,
        }
    }
}

impl fmt::Display for ExtractionGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listing {}: no {} found", self.listing_id, self.field)
    }
}
