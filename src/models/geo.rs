//! Geographic models: bounding boxes and search grid cells.

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Rectangular area in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a bounding box, rejecting degenerate or inverted boxes.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let bbox = Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check that min < max on both axes and all values are finite.
    pub fn validate(&self) -> Result<()> {
        let values = [self.min_lon, self.min_lat, self.max_lon, self.max_lat];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(HarvestError::InvalidInput(format!(
                "bounding box has non-finite coordinates: {:?}",
                self
            )));
        }
        if self.min_lon >= self.max_lon || self.min_lat >= self.max_lat {
            return Err(HarvestError::InvalidInput(format!(
                "degenerate bounding box: lon {}..{}, lat {}..{}",
                self.min_lon, self.max_lon, self.min_lat, self.max_lat
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// One search viewport: south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub sw_lat: f64,
    pub sw_lon: f64,
    pub ne_lat: f64,
    pub ne_lon: f64,
}

impl GridCell {
    pub fn width(&self) -> f64 {
        self.ne_lon - self.sw_lon
    }

    pub fn height(&self) -> f64 {
        self.ne_lat - self.sw_lat
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// True when the interiors of the two cells intersect (shared edges don't count).
    pub fn overlaps(&self, other: &GridCell, tolerance: f64) -> bool {
        let lon_overlap = self.ne_lon.min(other.ne_lon) - self.sw_lon.max(other.sw_lon);
        let lat_overlap = self.ne_lat.min(other.ne_lat) - self.sw_lat.max(other.sw_lat);
        lon_overlap > tolerance && lat_overlap > tolerance
    }
}
