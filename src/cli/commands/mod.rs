//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod grid;
mod registration;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};
use crate::discovery::City;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Harvest short-term rental listings and registration numbers")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config file)
    #[arg(long, global = true, env = "HARVESTER_DB")]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every search strategy over the city grid and store listings
    Crawl {
        /// City to crawl
        #[arg(long)]
        city: Option<City>,
        /// Number of grid cells
        #[arg(long)]
        cells: Option<usize>,
        /// Map zoom level sent with each search
        #[arg(long)]
        zoom: Option<f64>,
        /// Months for flexible searches (e.g. july august); defaults to the next three
        #[arg(long, num_args = 1..)]
        months: Vec<String>,
        /// Concurrent sessions
        #[arg(short, long)]
        workers: Option<usize>,
        /// Stop after this many sessions
        #[arg(long)]
        max_sessions: Option<usize>,
        /// Skip detail fetches for listings already in the database
        #[arg(long)]
        skip_existing: bool,
        /// Keep results in memory instead of writing the database
        #[arg(long)]
        dry_run: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-fetch details for every stored listing
    Refresh {
        /// Limit number of listings to refresh (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch one listing and print the extracted record
    Detail {
        /// Listing ID
        listing_id: String,
    },

    /// Print the search grid for a city
    Cells {
        #[arg(long)]
        city: Option<City>,
        /// Number of grid cells
        #[arg(long)]
        cells: Option<usize>,
    },

    /// Print the search URL templates
    Urls {
        #[arg(long)]
        city: Option<City>,
        /// Months for flexible searches; defaults to the next three
        #[arg(long, num_args = 1..)]
        months: Vec<String>,
    },

    /// Check a registration number against the registration policies
    CheckRegistration {
        /// Registration number, e.g. 24-159412
        number: String,
        /// Also query the public business licence registry
        #[arg(long)]
        online: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        database: cli.db,
    };
    let (settings, _config) = load_settings(&options).await?;

    match cli.command {
        Commands::Crawl {
            city,
            cells,
            zoom,
            months,
            workers,
            max_sessions,
            skip_existing,
            dry_run,
            json,
        } => {
            let args = crawl::CrawlArgs {
                city,
                cells,
                zoom,
                months,
                workers,
                max_sessions,
                skip_existing,
                dry_run,
                json,
            };
            crawl::cmd_crawl(&settings, args).await
        }
        Commands::Refresh {
            limit,
            workers,
            json,
        } => crawl::cmd_refresh(&settings, limit, workers, json).await,
        Commands::Detail { listing_id } => crawl::cmd_detail(&settings, &listing_id).await,
        Commands::Cells { city, cells } => grid::cmd_cells(&settings, city, cells),
        Commands::Urls { city, months } => grid::cmd_urls(&settings, city, &months),
        Commands::CheckRegistration { number, online } => {
            registration::cmd_check_registration(&settings, &number, online).await
        }
    }
}
