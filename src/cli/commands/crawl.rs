//! Crawl, refresh and single-listing commands.

use std::sync::Arc;

use console::style;

use crate::cli::helpers::{
    build_http_client, cancel_on_ctrl_c, print_host_stats, print_report, resolve_grid_size,
    resolve_months,
};
use crate::config::Settings;
use crate::discovery::{partition, City, SearchUrlBuilder, SearchUrlTemplate};
use crate::models::{CrawlReport, GridCell, ListingStub};
use crate::scrapers::{CrawlConfig, CrawlRun, DetailRequestBuilder, HttpClient};
use crate::storage::{ListingSink, MemorySink, SqliteSink};

/// Options for `harvest crawl`.
#[derive(Debug)]
pub struct CrawlArgs {
    pub city: Option<City>,
    pub cells: Option<usize>,
    pub zoom: Option<f64>,
    pub months: Vec<String>,
    pub workers: Option<usize>,
    pub max_sessions: Option<usize>,
    pub skip_existing: bool,
    pub dry_run: bool,
    pub json: bool,
}

/// Crawl every search template over the city grid.
pub async fn cmd_crawl(settings: &Settings, args: CrawlArgs) -> anyhow::Result<()> {
    let details = settings.detail_request_builder()?;
    let city = args.city.unwrap_or(settings.city);
    let grid_size = resolve_grid_size(settings, city, args.cells);
    let cells = partition(&city.bounding_box(), grid_size)?;

    let builder = SearchUrlBuilder::new(city.search_area());
    let months = resolve_months(&args.months, builder.today())?;
    let templates = builder.get_urls(&months);

    let mut config = settings.crawl_config();
    if let Some(zoom) = args.zoom {
        config.zoom = zoom;
    }
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }
    config.max_sessions = args.max_sessions;
    config.skip_existing = args.skip_existing;

    let total_sessions = templates.len() * cells.len();
    if !args.json {
        println!(
            "{} Crawling {}: {} cells x {} strategies = {} sessions, {} workers",
            style("→").cyan(),
            city,
            cells.len(),
            templates.len(),
            args.max_sessions
                .map_or(total_sessions, |m| m.min(total_sessions)),
            config.workers
        );
    }

    let report = if args.dry_run {
        let sink = Arc::new(MemorySink::new());
        run_crawl(settings, details, config, sink, &templates, &cells, args.json).await?
    } else {
        let sink = SqliteSink::new(settings.database_path())?;
        if !args.json {
            println!(
                "  Database: {}",
                style(sink.db_path().display()).dim()
            );
        }
        let sink = Arc::new(sink);
        run_crawl(settings, details, config, sink, &templates, &cells, args.json).await?
    };

    print_report(&report, args.json)
}

async fn run_crawl<S: ListingSink + 'static>(
    settings: &Settings,
    details: DetailRequestBuilder,
    config: CrawlConfig,
    sink: Arc<S>,
    templates: &[SearchUrlTemplate],
    cells: &[GridCell],
    json: bool,
) -> anyhow::Result<CrawlReport> {
    let cancel = cancel_on_ctrl_c();
    let client = Arc::new(build_http_client(settings, &cancel)?);
    let run = CrawlRun::new(client.clone(), sink, details, config).with_cancellation(cancel);

    let report = run.run(templates, cells).await;
    if !json {
        print_host_stats(&client.rate_limiter().get_stats().await);
    }
    Ok(report)
}

/// Re-fetch and overwrite every stored listing.
pub async fn cmd_refresh(
    settings: &Settings,
    limit: usize,
    workers: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let details = settings.detail_request_builder()?;
    let sink = Arc::new(SqliteSink::new(settings.database_path())?);
    let mut ids = sink.listing_ids().await?;
    if limit > 0 {
        ids.truncate(limit);
    }

    if ids.is_empty() {
        println!("{} No stored listings to refresh", style("!").yellow());
        return Ok(());
    }

    let mut config = settings.crawl_config();
    if let Some(workers) = workers {
        config.workers = workers.max(1);
    }

    if !json {
        println!(
            "{} Refreshing {} listings using {} workers",
            style("→").cyan(),
            ids.len(),
            config.workers
        );
    }

    let cancel = cancel_on_ctrl_c();
    let client = Arc::new(build_http_client(settings, &cancel)?);
    let run = CrawlRun::new(client.clone(), sink, details, config).with_cancellation(cancel);

    let report = run.refresh(ids).await;
    if !json {
        print_host_stats(&client.rate_limiter().get_stats().await);
    }
    print_report(&report, json)
}

/// Fetch one listing and print its record as JSON.
pub async fn cmd_detail(settings: &Settings, listing_id: &str) -> anyhow::Result<()> {
    let details = settings.detail_request_builder()?;
    let cancel = cancel_on_ctrl_c();
    let client: HttpClient = build_http_client(settings, &cancel)?;
    let run = CrawlRun::new(
        Arc::new(client),
        Arc::new(MemorySink::new()),
        details,
        settings.crawl_config(),
    )
    .with_cancellation(cancel);

    let stub = ListingStub {
        listing_id: listing_id.to_string(),
        ..Default::default()
    };
    let record = run.fetch_listing(stub).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
