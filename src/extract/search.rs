//! Listing stubs and pagination cursors from a search-page payload.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::{debug, warn};

use super::json_path::{lookup, read_array, read_bool, read_f64, read_scalar_string, read_string, read_u64};
use crate::models::{HostProfile, ListingStub};

const SPLIT_STAY_TYPENAME: &str = "SplitStaysListingItem";

/// Known layouts of the search results payload, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResultShape {
    /// `niobeClientData`: primary results plus map results, base64 composite
    /// ids under `demandStayListing`, host under `passportData`.
    Paired,
    /// `niobeMinimalClientData`: one flat list of `listing` objects.
    Flat,
}

impl SearchResultShape {
    pub const FALLBACK_CHAIN: [SearchResultShape; 2] = [Self::Paired, Self::Flat];

    fn root(&self) -> &'static str {
        match self {
            Self::Paired => "niobeClientData.0.1.data.presentation.staysSearch",
            Self::Flat => "niobeMinimalClientData.0.1.data.presentation.staysSearch",
        }
    }

    fn results_path(&self) -> String {
        format!("{}.results.searchResults", self.root())
    }

    fn map_results_path(&self) -> Option<String> {
        match self {
            Self::Paired => Some(format!("{}.mapResults.mapSearchResults", self.root())),
            Self::Flat => None,
        }
    }

    fn cursors_path(&self) -> String {
        format!("{}.results.paginationInfo.pageCursors", self.root())
    }
}

/// Stubs extracted from one page.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Shape that produced the stubs, `None` if no shape matched.
    pub shape: Option<SearchResultShape>,
    pub stubs: Vec<ListingStub>,
    /// Entries dropped for lack of a resolvable id.
    pub dropped: usize,
}

/// Run the shape chain over `payload`; the first shape yielding stubs wins.
pub fn extract_search_page(payload: &Value) -> SearchPage {
    for shape in SearchResultShape::FALLBACK_CHAIN {
        let page = extract_with_shape(payload, shape);
        if !page.stubs.is_empty() {
            return page;
        }
        if page.dropped > 0 {
            // Entries were there but none had an id; later shapes won't match either.
            return page;
        }
    }
    debug!("No known search result shape matched payload");
    SearchPage::default()
}

/// Pagination cursors from the first shape that has any.
pub fn extract_cursors(payload: &Value) -> Vec<String> {
    for shape in SearchResultShape::FALLBACK_CHAIN {
        let cursors: Vec<String> = read_array(payload, &shape.cursors_path())
            .iter()
            .filter_map(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        if !cursors.is_empty() {
            return cursors;
        }
    }
    Vec::new()
}

fn extract_with_shape(payload: &Value, shape: SearchResultShape) -> SearchPage {
    let mut page = SearchPage {
        shape: Some(shape),
        ..Default::default()
    };

    for entry in read_array(payload, &shape.results_path()) {
        collect_entry(shape, entry, &mut page);
    }

    if let Some(map_path) = shape.map_results_path() {
        let mut seen: HashSet<String> = page.stubs.iter().map(|s| s.listing_id.clone()).collect();
        let mut from_map = SearchPage::default();
        for entry in read_array(payload, &map_path) {
            collect_entry(shape, entry, &mut from_map);
        }
        for stub in from_map.stubs {
            if seen.insert(stub.listing_id.clone()) {
                page.stubs.push(stub);
            }
        }
        page.dropped += from_map.dropped;
    }

    page
}

fn collect_entry(shape: SearchResultShape, entry: &Value, page: &mut SearchPage) {
    if entry.get("__typename").and_then(Value::as_str) == Some(SPLIT_STAY_TYPENAME) {
        let price_label = price_label(shape, entry);
        for stay in read_array(entry, "splitStaysListings") {
            match parse_entry(shape, stay) {
                Some(mut stub) => {
                    stub.host = None;
                    if stub.price_label.is_empty() {
                        stub.price_label = price_label.clone();
                    }
                    page.stubs.push(stub);
                }
                None => {
                    warn!("Dropping split-stay member without a listing id");
                    page.dropped += 1;
                }
            }
        }
        return;
    }

    match parse_entry(shape, entry) {
        Some(stub) => page.stubs.push(stub),
        None => {
            warn!("Dropping search result without a listing id");
            page.dropped += 1;
        }
    }
}

fn parse_entry(shape: SearchResultShape, entry: &Value) -> Option<ListingStub> {
    match shape {
        SearchResultShape::Paired => parse_paired_entry(entry),
        SearchResultShape::Flat => parse_flat_entry(entry),
    }
}

fn price_label(shape: SearchResultShape, entry: &Value) -> String {
    let path = match shape {
        SearchResultShape::Paired => "structuredDisplayPrice.primaryLine.accessibilityLabel",
        SearchResultShape::Flat => {
            "pricingQuote.structuredStayDisplayPrice.primaryLine.accessibilityLabel"
        }
    };
    read_string(entry, path)
}

fn parse_paired_entry(entry: &Value) -> Option<ListingStub> {
    let listing_id = read_scalar_string(entry, "demandStayListing.id")
        .and_then(|raw| decode_composite_id(&raw))
        .or_else(|| read_scalar_string(entry, "listing.id"))
        .filter(|id| !id.is_empty())?;

    let name = first_string(
        entry,
        &[
            "demandStayListing.description.name.localizedStringWithTranslationPreference",
            "listing.name",
            "name",
        ],
    );

    let host = lookup(entry, "passportData").map(parse_passport);

    Some(ListingStub {
        listing_id,
        title: first_string(entry, &["title", "listing.title"]),
        name,
        latitude: read_f64(entry, "demandStayListing.location.coordinate.latitude")
            .or_else(|| read_f64(entry, "listing.coordinate.latitude")),
        longitude: read_f64(entry, "demandStayListing.location.coordinate.longitude")
            .or_else(|| read_f64(entry, "listing.coordinate.longitude")),
        room_type: first_string(entry, &["listing.roomTypeCategory", "roomTypeCategory"]),
        price_label: price_label(SearchResultShape::Paired, entry),
        host,
    })
}

fn parse_flat_entry(entry: &Value) -> Option<ListingStub> {
    let listing_id = read_scalar_string(entry, "listing.id").filter(|id| !id.is_empty())?;

    Some(ListingStub {
        listing_id,
        title: read_string(entry, "listing.title"),
        name: read_string(entry, "listing.name"),
        latitude: read_f64(entry, "listing.coordinate.latitude"),
        longitude: read_f64(entry, "listing.coordinate.longitude"),
        room_type: read_string(entry, "listing.roomTypeCategory"),
        price_label: price_label(SearchResultShape::Flat, entry),
        host: None,
    })
}

/// Host fields from a `passportData` object.
pub(crate) fn parse_passport(passport: &Value) -> HostProfile {
    let user_id = read_scalar_string(passport, "userId")
        .map(|raw| decode_composite_id(&raw).unwrap_or(raw))
        .unwrap_or_default();

    HostProfile {
        user_id,
        name: read_string(passport, "name"),
        title_text: read_string(passport, "titleText"),
        profile_picture_url: read_string(passport, "profilePictureUrl"),
        thumbnail_url: read_string(passport, "thumbnailUrl"),
        is_verified: read_bool(passport, "isVerified").unwrap_or(false),
        is_superhost: read_bool(passport, "isSuperhost").unwrap_or(false),
        rating_count: read_u64(passport, "ratingCount"),
        rating_average: read_f64(passport, "ratingAverage"),
        time_as_host_years: read_u64(passport, "timeAsHost.years").map(|v| v as u32),
        time_as_host_months: read_u64(passport, "timeAsHost.months").map(|v| v as u32),
    }
}

/// Decode a base64 `"<type>:<id>"` composite and return the id part.
///
/// Plain numeric ids pass through unchanged.
pub fn decode_composite_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return Some(raw.to_string());
    }
    let bytes = STANDARD.decode(raw).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (_, id) = decoded.split_once(':')?;
    let id = id.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn first_string(entry: &Value, paths: &[&str]) -> String {
    paths
        .iter()
        .map(|p| read_string(entry, p))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}
