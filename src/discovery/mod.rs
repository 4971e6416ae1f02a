//! Search discovery: which viewports to search and with which URLs.

pub mod city;
pub mod grid;
pub mod search_url;

pub use city::{City, SearchArea};
pub use grid::{grid_size, partition};
pub use search_url::{
    current_months, parse_months, DateStrategy, SearchUrlBuilder, SearchUrlTemplate,
};
