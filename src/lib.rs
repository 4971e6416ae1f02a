//! Harvester - short-term rental listing crawler.
//!
//! Partitions a city into map viewports, runs every search strategy over
//! each viewport, follows result pagination and fetches each listing's
//! detail record, then normalizes it and hands it to a storage sink.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;

pub use error::{HarvestError, Result};
