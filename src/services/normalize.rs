//! Free-text cleanup for bed, bath and registration fields.
//!
//! Every function here is total: unparseable input yields `None` or an
//! empty value, never a panic or error.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ListingDetail, NormalizedListing, RegistrationNumbers};

static LEADING_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+").unwrap());

static LEADING_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?").unwrap());

static HALF_BATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bhalf-bath\b").unwrap());

static MUNICIPAL_REGISTRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Municipal registration number:\s*(\d+)").unwrap()
});

static PROVINCIAL_REGISTRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Provincial registration number:\s*([A-Za-z0-9]+)").unwrap()
});

/// Bed count from text like "2 beds"; `None` for "studio".
pub fn beds(text: &str) -> Option<u32> {
    LEADING_INTEGER
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Bath count from text like "1.5 baths" or "Half-bath".
pub fn baths(text: &str) -> Option<f64> {
    if text.trim().is_empty() {
        return None;
    }
    if let Some(m) = LEADING_DECIMAL.find(text) {
        return m.as_str().parse().ok();
    }
    if HALF_BATH.is_match(text) {
        return Some(0.5);
    }
    None
}

/// Whether the bath text describes a shared bathroom.
///
/// Case-sensitive: "Shared half-bath" reads as not shared.
pub fn bath_is_shared(text: &str) -> bool {
    text.contains("shared")
}

/// Municipal and provincial registration numbers from description text.
pub fn parse_registration(text: &str) -> RegistrationNumbers {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    RegistrationNumbers {
        municipal: capture(&MUNICIPAL_REGISTRATION),
        provincial: capture(&PROVINCIAL_REGISTRATION),
    }
}

/// Render registration text as `"<municipal>;<provincial>"`.
///
/// Older pages show only a bare number with no labels; when neither label
/// matches, the trimmed raw text is returned instead.
pub fn registration_number(text: &str) -> String {
    let numbers = parse_registration(text);
    if numbers.is_empty() {
        text.trim().to_string()
    } else {
        numbers.joined()
    }
}

/// Produce the final record from an extracted detail.
pub fn normalize(detail: &ListingDetail) -> NormalizedListing {
    let registration = parse_registration(&detail.registration_text);

    NormalizedListing {
        listing_id: detail.listing_id.clone(),
        title: detail.title.clone(),
        name: detail.name.clone(),
        latitude: detail.latitude,
        longitude: detail.longitude,
        room_type: detail.room_type.clone(),
        location: detail.location.clone(),
        person_capacity: detail.person_capacity,
        beds: beds(&detail.beds_text),
        baths: baths(&detail.baths_text),
        bath_is_shared: bath_is_shared(&detail.baths_text),
        registration_number: detail.registration_number.clone(),
        registration,
        host: detail.host.clone(),
    }
}
