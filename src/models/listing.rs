//! Listing records at each stage of the pipeline.
//!
//! A [`ListingStub`] comes out of a search page, a [`ListingDetail`] is the
//! stub enriched from the listing's detail payload, and a
//! [`NormalizedListing`] is the cleaned record handed to the storage sink.

use serde::{Deserialize, Serialize};

/// Host identity as shown on search cards ("passport") and detail pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostProfile {
    pub user_id: String,
    pub name: String,
    pub title_text: String,
    pub profile_picture_url: String,
    pub thumbnail_url: String,
    pub is_verified: bool,
    pub is_superhost: bool,
    pub rating_count: Option<u64>,
    pub rating_average: Option<f64>,
    pub time_as_host_years: Option<u32>,
    pub time_as_host_months: Option<u32>,
}

/// Minimal listing record from a search-results page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingStub {
    /// Numeric listing id as a string; the join key for the detail fetch.
    pub listing_id: String,
    pub title: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub room_type: String,
    /// Accessible price line shown on the card, if any.
    pub price_label: String,
    /// Host passport; always `None` for split-stay members.
    pub host: Option<HostProfile>,
}

/// Stub plus everything the detail payload contributed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub listing_id: String,
    pub title: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub room_type: String,
    pub price_label: String,
    pub location: String,
    pub person_capacity: Option<u32>,
    /// Raw registration text from the description modal.
    pub registration_text: String,
    /// `"<municipal>;<provincial>"`, or the raw number on legacy pages.
    pub registration_number: String,
    pub beds_text: String,
    pub baths_text: String,
    pub host: HostProfile,
}

impl From<ListingStub> for ListingDetail {
    fn from(stub: ListingStub) -> Self {
        Self {
            listing_id: stub.listing_id,
            title: stub.title,
            name: stub.name,
            latitude: stub.latitude,
            longitude: stub.longitude,
            room_type: stub.room_type,
            price_label: stub.price_label,
            host: stub.host.unwrap_or_default(),
            ..Default::default()
        }
    }
}

impl From<&ListingDetail> for ListingStub {
    /// The search-card view of a stored detail, used to seed a refresh.
    fn from(detail: &ListingDetail) -> Self {
        Self {
            listing_id: detail.listing_id.clone(),
            title: detail.title.clone(),
            name: detail.name.clone(),
            latitude: detail.latitude,
            longitude: detail.longitude,
            room_type: detail.room_type.clone(),
            price_label: detail.price_label.clone(),
            host: Some(detail.host.clone()),
        }
    }
}

/// Registration number split into its jurisdiction components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationNumbers {
    pub municipal: Option<String>,
    pub provincial: Option<String>,
}

impl RegistrationNumbers {
    pub fn is_empty(&self) -> bool {
        self.municipal.is_none() && self.provincial.is_none()
    }

    /// Render as `"<municipal>;<provincial>"` with empty sides for absent parts.
    pub fn joined(&self) -> String {
        format!(
            "{};{}",
            self.municipal.as_deref().unwrap_or(""),
            self.provincial.as_deref().unwrap_or("")
        )
    }
}

/// Final cleaned record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    pub listing_id: String,
    pub title: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub room_type: String,
    pub location: String,
    pub person_capacity: Option<u32>,
    pub beds: Option<u32>,
    pub baths: Option<f64>,
    pub bath_is_shared: bool,
    pub registration_number: String,
    pub registration: RegistrationNumbers,
    pub host: HostProfile,
}

/// What the crawl hands to a storage sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub normalized: NormalizedListing,
    /// Unnormalized detail kept for auditing.
    pub raw: ListingDetail,
}

impl ListingRecord {
    pub fn listing_id(&self) -> &str {
        &self.normalized.listing_id
    }
}
