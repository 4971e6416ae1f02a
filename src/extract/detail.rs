//! Listing detail extraction from the detail API payload.
//!
//! Four independent steps fill in capacity and location, registration,
//! bed and bath text, and host identity. A step that finds nothing leaves
//! its fields at their defaults and records an [`ExtractionGap`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::json_path::{lookup, read_array, read_bool, read_f64, read_scalar_string, read_str, read_string, read_u64};
use super::search::decode_composite_id;
use super::ExtractionGap;
use crate::models::{HostProfile, ListingDetail};
use crate::services::normalize::registration_number;

const SECTIONS_PATH: &str = "data.presentation.stayProductDetailPage.sections.sections";
const METADATA_PATH: &str = "data.presentation.stayProductDetailPage.sections.metadata";

const SIDEBAR: &str = "BOOK_IT_SIDEBAR";
const POLICIES: &str = "POLICIES_DEFAULT";
const LOCATION: &str = "LOCATION_DEFAULT";
const DESCRIPTION_MODAL: &str = "PDP_DESCRIPTION_MODAL";
const AVAILABILITY: &str = "AVAILABILITY_CALENDAR_DEFAULT";
const OVERVIEW: &str = "OVERVIEW_DEFAULT_V2";
const MEET_YOUR_HOST: &str = "MEET_YOUR_HOST";

const REGISTRATION_TITLES: &[&str] = &["Registration number", "Registration details"];

static GUESTS_MAXIMUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+guests? maximum").unwrap());

/// Result of running every extraction step over one payload.
#[derive(Debug, Clone)]
pub struct DetailExtraction {
    pub detail: ListingDetail,
    pub gaps: Vec<ExtractionGap>,
}

/// Enrich `base` (built from the search stub) with the detail payload.
pub fn extract_detail(payload: &Value, base: ListingDetail) -> DetailExtraction {
    let sections = read_array(payload, SECTIONS_PATH);
    let metadata = lookup(payload, METADATA_PATH);

    let mut detail = base;
    let mut gaps = Vec::new();

    capacity_and_location(sections, metadata, &mut detail, &mut gaps);
    registration(sections, &mut detail, &mut gaps);
    beds_and_baths(sections, &mut detail, &mut gaps);
    host(sections, &mut detail, &mut gaps);

    for gap in &gaps {
        debug!("{}", gap);
    }

    DetailExtraction { detail, gaps }
}

/// Sections whose component type or section id equals `key`.
fn sections_named<'a>(sections: &'a [Value], key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    sections.iter().filter(move |s| {
        read_str(s, "sectionComponentType") == Some(key) || read_str(s, "sectionId") == Some(key)
    })
}

fn capacity_and_location(
    sections: &[Value],
    metadata: Option<&Value>,
    detail: &mut ListingDetail,
    gaps: &mut Vec<ExtractionGap>,
) {
    // Sidebar, then legacy sharing metadata, then the house rules line.
    let capacity = sections_named(sections, SIDEBAR)
        .find_map(|s| read_u64(s, "section.maxGuestCapacity"))
        .or_else(|| metadata.and_then(|m| read_u64(m, "sharingConfig.personCapacity")))
        .or_else(|| {
            sections_named(sections, POLICIES)
                .flat_map(|s| read_array(s, "section.houseRules"))
                .filter_map(|rule| read_str(rule, "title"))
                .find_map(|title| {
                    GUESTS_MAXIMUM
                        .captures(title)
                        .and_then(|c| c.get(1))
                        .and_then(|m| m.as_str().parse::<u64>().ok())
                })
        });

    match capacity {
        Some(n) => detail.person_capacity = u32::try_from(n).ok(),
        None => gaps.push(ExtractionGap::new(&detail.listing_id, "person_capacity")),
    }

    let location = sections_named(sections, LOCATION)
        .map(|s| read_string(s, "section.subtitle"))
        .find(|s| !s.is_empty())
        .or_else(|| {
            metadata
                .map(|m| read_string(m, "sharingConfig.location"))
                .filter(|s| !s.is_empty())
        });

    match location {
        Some(loc) => detail.location = loc,
        None => gaps.push(ExtractionGap::new(&detail.listing_id, "location")),
    }
}

fn registration(sections: &[Value], detail: &mut ListingDetail, gaps: &mut Vec<ExtractionGap>) {
    let text = sections_named(sections, DESCRIPTION_MODAL)
        .flat_map(|s| read_array(s, "section.items"))
        .filter(|item| {
            read_str(item, "title").is_some_and(|t| REGISTRATION_TITLES.contains(&t))
        })
        .map(|item| read_string(item, "html.htmlText"))
        .filter(|t| !t.trim().is_empty())
        .last();

    match text {
        Some(text) => {
            detail.registration_number = registration_number(&text);
            detail.registration_text = text;
        }
        None => gaps.push(ExtractionGap::new(&detail.listing_id, "registration_number")),
    }
}

fn beds_and_baths(sections: &[Value], detail: &mut ListingDetail, gaps: &mut Vec<ExtractionGap>) {
    let sources: [(&str, &str); 2] = [
        (AVAILABILITY, "section.descriptionItems"),
        (OVERVIEW, "section.overviewItems"),
    ];

    for (key, items_path) in sources {
        let mut beds = String::new();
        let mut baths = String::new();
        for title in sections_named(sections, key)
            .flat_map(|s| read_array(s, items_path))
            .filter_map(|item| read_str(item, "title"))
        {
            // Case-sensitive, last match wins.
            if title.contains("bed") {
                beds = title.to_string();
            }
            if title.contains("bath") {
                baths = title.to_string();
            }
        }
        if detail.beds_text.is_empty() && !beds.is_empty() {
            detail.beds_text = beds;
        }
        if detail.baths_text.is_empty() && !baths.is_empty() {
            detail.baths_text = baths;
        }
        if !detail.beds_text.is_empty() && !detail.baths_text.is_empty() {
            break;
        }
    }

    if detail.beds_text.is_empty() {
        gaps.push(ExtractionGap::new(&detail.listing_id, "beds"));
    }
    if detail.baths_text.is_empty() {
        gaps.push(ExtractionGap::new(&detail.listing_id, "baths"));
    }
}

fn host(sections: &[Value], detail: &mut ListingDetail, gaps: &mut Vec<ExtractionGap>) {
    let card = sections_named(sections, MEET_YOUR_HOST).find_map(|s| lookup(s, "section.cardData"));

    let Some(card) = card else {
        gaps.push(ExtractionGap::new(&detail.listing_id, "host"));
        return;
    };

    let user_id = read_scalar_string(card, "userId")
        .map(|raw| decode_composite_id(&raw).unwrap_or(raw))
        .unwrap_or_default();

    let from_card = HostProfile {
        user_id,
        name: read_string(card, "name"),
        profile_picture_url: read_string(card, "profilePictureUrl"),
        rating_count: read_u64(card, "ratingCount"),
        rating_average: read_f64(card, "ratingAverage"),
        time_as_host_years: read_u64(card, "timeAsHost.years").map(|v| v as u32),
        time_as_host_months: read_u64(card, "timeAsHost.months").map(|v| v as u32),
        ..Default::default()
    };

    merge_host(&mut detail.host, from_card);

    // Absent flags keep the passport value; explicit ones override it.
    if let Some(superhost) = read_bool(card, "isSuperhost") {
        detail.host.is_superhost = superhost;
    }
    if let Some(verified) = read_bool(card, "isVerified") {
        detail.host.is_verified = verified;
    }
}

/// Card values win; search passport values fill what the card lacks.
fn merge_host(existing: &mut HostProfile, card: HostProfile) {
    let keep = |new: String, old: &mut String| {
        if !new.is_empty() {
            *old = new;
        }
    };
    keep(card.user_id, &mut existing.user_id);
    keep(card.name, &mut existing.name);
    keep(card.profile_picture_url, &mut existing.profile_picture_url);
    existing.rating_count = card.rating_count.or(existing.rating_count);
    existing.rating_average = card.rating_average.or(existing.rating_average);
    existing.time_as_host_years = card.time_as_host_years.or(existing.time_as_host_years);
    existing.time_as_host_months = card.time_as_host_months.or(existing.time_as_host_months);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(sections: Value, metadata: Value) -> Value {
        json!({
            "data": {"presentation": {"stayProductDetailPage": {"sections": {
                "sections": sections,
                "metadata": metadata
            }}}}
        })
    }

    fn base() -> ListingDetail {
        ListingDetail {
            listing_id: "555".into(),
            title: "Home in Vancouver".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_legacy_payload() {
        let payload = payload(
            json!([
                {
                    "sectionComponentType": "PDP_DESCRIPTION_MODAL",
                    "section": {"items": [
                        {"title": "The space", "html": {"htmlText": "Lovely"}},
                        {"title": "Registration number", "html": {"htmlText": "123456"}}
                    ]}
                },
                {
                    "sectionComponentType": "AVAILABILITY_CALENDAR_DEFAULT",
                    "section": {"descriptionItems": [
                        {"title": "2 beds"},
                        {"title": "1 bath"}
                    ]}
                }
            ]),
            json!({"sharingConfig": {"location": "Vancouver", "personCapacity": 3}}),
        );

        let out = extract_detail(&payload, base());
        let d = &out.detail;
        assert_eq!(d.registration_number, "123456");
        assert_eq!(d.beds_text, "2 beds");
        assert_eq!(d.baths_text, "1 bath");
        assert_eq!(d.location, "Vancouver");
        assert_eq!(d.person_capacity, Some(3));
        assert_eq!(d.title, "Home in Vancouver");
        assert_eq!(out.gaps, vec![ExtractionGap::new("555", "host")]);
    }

    #[test]
    fn test_current_payload() {
        let payload = payload(
            json!([
                {"sectionId": "BOOK_IT_SIDEBAR", "section": {"maxGuestCapacity": 4}},
                {"sectionId": "LOCATION_DEFAULT", "section": {"subtitle": "Vancouver, British Columbia, Canada"}},
                {
                    "sectionComponentType": "PDP_DESCRIPTION_MODAL",
                    "section": {"items": [{
                        "title": "Registration details",
                        "html": {"htmlText": "Municipal registration number: 24156789<br />Provincial registration number: H123456789"}
                    }]}
                },
                {
                    "sectionId": "OVERVIEW_DEFAULT_V2",
                    "section": {"overviewItems": [
                        {"title": "4 guests"},
                        {"title": "1 bedroom"},
                        {"title": "2 beds"},
                        {"title": "1.5 shared baths"}
                    ]}
                },
                {
                    "sectionId": "MEET_YOUR_HOST",
                    "section": {"cardData": {
                        "userId": "VXNlcjo0MjQy",
                        "name": "Robin",
                        "profilePictureUrl": "https://a0.muscache.com/im/pictures/user/robin.jpg",
                        "isSuperhost": true,
                        "isVerified": true,
                        "ratingCount": 210,
                        "ratingAverage": 4.87,
                        "timeAsHost": {"years": 6, "months": 1}
                    }}
                }
            ]),
            json!({}),
        );

        let out = extract_detail(&payload, base());
        let d = &out.detail;
        assert!(out.gaps.is_empty(), "unexpected gaps: {:?}", out.gaps);
        assert_eq!(d.person_capacity, Some(4));
        assert_eq!(d.location, "Vancouver, British Columbia, Canada");
        assert_eq!(d.registration_number, "24156789;H123456789");
        // "1 bedroom" and "2 beds" both contain "bed"; the last one wins.
        assert_eq!(d.beds_text, "2 beds");
        assert_eq!(d.baths_text, "1.5 shared baths");
        assert_eq!(d.host.user_id, "4242");
        assert_eq!(d.host.name, "Robin");
        assert!(d.host.is_superhost);
        assert_eq!(d.host.rating_count, Some(210));
        assert_eq!(d.host.time_as_host_years, Some(6));
    }

    #[test]
    fn test_house_rules_capacity_fallback() {
        let payload = payload(
            json!([{
                "sectionId": "POLICIES_DEFAULT",
                "section": {"houseRules": [
                    {"title": "Check-in after 4:00 p.m."},
                    {"title": "6 guests maximum"}
                ]}
            }]),
            json!(null),
        );
        let out = extract_detail(&payload, base());
        assert_eq!(out.detail.person_capacity, Some(6));
    }

    #[test]
    fn test_bed_match_is_case_sensitive() {
        let payload = payload(
            json!([{
                "sectionComponentType": "AVAILABILITY_CALENDAR_DEFAULT",
                "section": {"descriptionItems": [{"title": "Bedroom"}, {"title": "Bath"}]}
            }]),
            json!({}),
        );
        let out = extract_detail(&payload, base());
        assert_eq!(out.detail.beds_text, "");
        assert_eq!(out.detail.baths_text, "");
        assert!(out.gaps.contains(&ExtractionGap::new("555", "beds")));
    }

    #[test]
    fn test_garbage_payload_keeps_base() {
        let out = extract_detail(&json!(["not", "an", "object"]), base());
        assert_eq!(out.detail.title, "Home in Vancouver");
        assert_eq!(out.detail.person_capacity, None);
        assert_eq!(out.gaps.len(), 6);
    }

    #[test]
    fn test_search_passport_fills_missing_card_fields() {
        let mut start = base();
        start.host = HostProfile {
            name: "Passport Name".into(),
            thumbnail_url: "https://example.com/t.jpg".into(),
            rating_count: Some(10),
            ..Default::default()
        };
        let payload = payload(
            json!([{
                "sectionId": "MEET_YOUR_HOST",
                "section": {"cardData": {"name": "Card Name"}}
            }]),
            json!({}),
        );
        let host = extract_detail(&payload, start).detail.host;
        assert_eq!(host.name, "Card Name");
        assert_eq!(host.thumbnail_url, "https://example.com/t.jpg");
        assert_eq!(host.rating_count, Some(10));
    }

    #[test]
    fn test_card_flags_override_passport() {
        let mut start = base();
        start.host = HostProfile {
            is_superhost: true,
            is_verified: true,
            ..Default::default()
        };
        let payload = payload(
            json!([{
                "sectionId": "MEET_YOUR_HOST",
                "section": {"cardData": {"name": "Card Name", "isSuperhost": false}}
            }]),
            json!({}),
        );
        let host = extract_detail(&payload, start).detail.host;
        assert!(!host.is_superhost);
        // Not reported by the card, so the passport value stands.
        assert!(host.is_verified);
    }
}
