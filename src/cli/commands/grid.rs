//! Inspect the search plan without fetching anything.

use console::style;

use crate::cli::helpers::{resolve_grid_size, resolve_months};
use crate::config::Settings;
use crate::discovery::{grid_size, partition, City, SearchUrlBuilder};

/// Print the grid cells for a city.
pub fn cmd_cells(settings: &Settings, city: Option<City>, cells: Option<usize>) -> anyhow::Result<()> {
    let city = city.unwrap_or(settings.city);
    let n = resolve_grid_size(settings, city, cells);
    let (cols, rows) = grid_size(n)?;
    let grid = partition(&city.bounding_box(), n)?;

    println!(
        "{} {}: {} cells ({} columns x {} rows)",
        style("→").cyan(),
        city,
        grid.len(),
        cols,
        rows
    );
    println!(
        "  {:>4}  {:>12} {:>13}  {:>12} {:>13}",
        "#", "sw_lat", "sw_lon", "ne_lat", "ne_lon"
    );
    for (i, cell) in grid.iter().enumerate() {
        println!(
            "  {:>4}  {:>12.6} {:>13.6}  {:>12.6} {:>13.6}",
            i, cell.sw_lat, cell.sw_lon, cell.ne_lat, cell.ne_lon
        );
    }
    Ok(())
}

/// Print the unresolved search URL templates.
pub fn cmd_urls(settings: &Settings, city: Option<City>, months: &[String]) -> anyhow::Result<()> {
    let city = city.unwrap_or(settings.city);
    let builder = SearchUrlBuilder::new(city.search_area());
    let months = resolve_months(months, builder.today())?;

    for template in builder.get_urls(&months) {
        println!("{}", style(template.strategy.label()).bold());
        println!("  {}", template.as_str());
    }
    Ok(())
}
