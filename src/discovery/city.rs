//! Cities the harvester knows how to search.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;
use crate::models::BoundingBox;

/// A supported city and its search parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum City {
    #[default]
    Vancouver,
}

impl City {
    pub const ALL: &'static [City] = &[City::Vancouver];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vancouver => "vancouver",
        }
    }

    /// City limits as a lon/lat box.
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Self::Vancouver => BoundingBox {
                min_lon: -123.27242760663955,
                min_lat: 49.19990476493376,
                max_lon: -123.02310030521373,
                max_lat: 49.29923664124871,
            },
        }
    }

    /// Grid cell count that keeps every viewport under the result cap.
    pub fn default_grid_size(&self) -> usize {
        match self {
            Self::Vancouver => 100,
        }
    }

    /// Search area parameters used by the URL builder.
    pub fn search_area(&self) -> SearchArea {
        match self {
            Self::Vancouver => SearchArea {
                host: "https://www.airbnb.ca".to_string(),
                path: "s/Vancouver--Canada/homes".to_string(),
                query: "Vancouver, BC".to_string(),
                place_id: "ChIJs0-pQ_FzhlQRi_OBm-qWkbs".to_string(),
            },
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vancouver" | "vancouver, bc" | "yvr" => Ok(Self::Vancouver),
            other => Err(HarvestError::InvalidInput(format!(
                "unknown city '{}' (known: {})",
                other,
                City::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Where and what a search URL targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArea {
    /// Scheme and host, without a trailing slash.
    pub host: String,
    /// Search path below the host.
    pub path: String,
    pub query: String,
    pub place_id: String,
}

impl SearchArea {
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

impl Default for SearchArea {
    fn default() -> Self {
        City::Vancouver.search_area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_city() {
        assert_eq!("Vancouver".parse::<City>().unwrap(), City::Vancouver);
        assert_eq!(" VANCOUVER ".parse::<City>().unwrap(), City::Vancouver);
        assert!("toronto".parse::<City>().is_err());
    }

    #[test]
    fn test_vancouver_box_is_valid() {
        assert!(City::Vancouver.bounding_box().validate().is_ok());
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            SearchArea::default().base_url(),
            "https://www.airbnb.ca/s/Vancouver--Canada/homes"
        );
    }
}
