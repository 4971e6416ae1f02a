//! Data models for the harvester.

mod crawl;
mod geo;
mod listing;

pub use crawl::{CrawlCounters, CrawlReport};
pub use geo::{BoundingBox, GridCell};
pub use listing::{
    HostProfile, ListingDetail, ListingRecord, ListingStub, NormalizedListing,
    RegistrationNumbers,
};
