//! Partition a bounding box into a grid of search viewports.
//!
//! The site caps how many results a single map search returns, so a city is
//! split into roughly `n` cells and every cell is searched on its own.

use crate::error::{HarvestError, Result};
use crate::models::{BoundingBox, GridCell};

/// Column and row counts for a grid of about `n` cells.
///
/// `cols = max(1, floor(sqrt(n)))`, `rows = ceil(n / cols)`. The product can
/// exceed `n` (50 gives 7 x 8 = 56).
pub fn grid_size(n: usize) -> Result<(usize, usize)> {
    if n == 0 {
        return Err(HarvestError::InvalidInput(
            "grid cell count must be at least 1".to_string(),
        ));
    }
    let cols = ((n as f64).sqrt().floor() as usize).max(1);
    let rows = n.div_ceil(cols);
    Ok((cols, rows))
}

/// Split `bbox` into a row-major grid of about `n` cells.
///
/// North-east edges are clamped to the box so floating-point drift never
/// pushes the last row or column past the source area.
pub fn partition(bbox: &BoundingBox, n: usize) -> Result<Vec<GridCell>> {
    bbox.validate()?;
    let (cols, rows) = grid_size(n)?;

    let cell_width = bbox.width() / cols as f64;
    let cell_height = bbox.height() / rows as f64;

    let mut cells = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            let sw_lon = bbox.min_lon + col as f64 * cell_width;
            let sw_lat = bbox.min_lat + row as f64 * cell_height;
            // The last row/column reach the box edge exactly.
            let ne_lon = if col + 1 == cols {
                bbox.max_lon
            } else {
                (sw_lon + cell_width).min(bbox.max_lon)
            };
            let ne_lat = if row + 1 == rows {
                bbox.max_lat
            } else {
                (sw_lat + cell_height).min(bbox.max_lat)
            };
            cells.push(GridCell {
                sw_lat,
                sw_lon,
                ne_lat,
                ne_lon,
            });
        }
    }

    tracing::debug!(
        "Partitioned bbox into {} cells ({} cols x {} rows)",
        cells.len(),
        cols,
        rows
    );
    Ok(cells)
}
