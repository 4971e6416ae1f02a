//! Shared helper functions for CLI commands.

use std::collections::HashMap;

use chrono::Month;
use console::style;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::discovery::{current_months, parse_months, City};
use crate::models::CrawlReport;
use crate::scrapers::{HostStats, HttpClient, RateLimiter};

/// Months searched when none are given.
const DEFAULT_MONTH_COUNT: usize = 3;

/// Build the HTTP client from settings, stopping admission on `cancel`.
pub fn build_http_client(
    settings: &Settings,
    cancel: &CancellationToken,
) -> anyhow::Result<HttpClient> {
    let limiter = RateLimiter::with_config(settings.rate_limit_config());
    let client = HttpClient::new(
        settings.request_timeout(),
        settings.user_agent.as_deref(),
        limiter,
    )?;
    Ok(client.with_cancellation(cancel.clone()))
}

/// Token cancelled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{} Cancelling; waiting for in-flight requests",
                style("!").yellow()
            );
            trigger.cancel();
        }
    });
    token
}

/// Grid size for `city`: explicit flag, then config, then the city default.
pub fn resolve_grid_size(settings: &Settings, city: City, cells: Option<usize>) -> usize {
    cells
        .or(settings.grid_size)
        .unwrap_or_else(|| city.default_grid_size())
}

pub fn resolve_months(names: &[String], today: chrono::NaiveDate) -> anyhow::Result<Vec<Month>> {
    if names.is_empty() {
        Ok(current_months(today, DEFAULT_MONTH_COUNT))
    } else {
        Ok(parse_months(names)?)
    }
}

pub fn print_report(report: &CrawlReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let marker = if report.cancelled {
        style("!").yellow()
    } else if report.sessions_failed > 0 || report.failed > 0 {
        style("~").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "{} {}",
        marker,
        if report.cancelled {
            "Run cancelled"
        } else {
            "Run complete"
        }
    );

    if report.sessions_started > 0 {
        println!(
            "  Sessions:   {} started, {} completed, {} failed",
            report.sessions_started, report.sessions_completed, report.sessions_failed
        );
        println!("  Pages:      {}", report.pages_fetched);
    }
    println!(
        "  Listings:   {} discovered, {} duplicates skipped",
        report.listings_discovered, report.duplicates_skipped
    );
    println!(
        "  Details:    {} fetched, {} normalized",
        report.details_fetched, report.normalized
    );
    println!(
        "  Saved:      {} new, {} updated, {} already stored",
        style(report.saved_created).green(),
        report.saved_updated,
        report.saved_duplicate
    );
    if report.failed > 0 {
        println!("  Failed:     {}", style(report.failed).red());
    }
    Ok(())
}

/// Per-host pacing at the end of a run, hosts sorted by name.
pub fn print_host_stats(stats: &HashMap<String, HostStats>) {
    let mut hosts: Vec<_> = stats.iter().collect();
    hosts.sort_by(|a, b| a.0.cmp(b.0));
    for (host, s) in hosts {
        let state = if s.in_backoff {
            style("backoff").yellow()
        } else {
            style("ok").green()
        };
        println!(
            "  {} {} requests, {} rate limited, delay {:?} ({})",
            style(host).dim(),
            s.total_requests,
            s.rate_limit_hits,
            s.current_delay,
            state
        );
    }
}
