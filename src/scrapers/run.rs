//! Crawl run: drives sessions on a worker pool and feeds listings to a sink.
//!
//! Sessions are queued up front (templates × cells). Each worker pops a
//! session and drives it to completion, so pages within a session stay
//! strictly sequential while sessions proceed in parallel. All network
//! access goes through the [`PageFetcher`]; per-host pacing is the
//! fetcher's concern.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::detail_request::DetailRequestBuilder;
use super::fetcher::{FetchRequest, PageFetcher};
use super::http_client::FetchedPage;
use super::session::{CrawlAction, CrawlSession};
use crate::discovery::SearchUrlTemplate;
use crate::error::{HarvestError, Result};
use crate::extract::{extract_detail, parse_json_body, DEFAULT_SCRIPT_TAG};
use crate::models::{CrawlCounters, CrawlReport, GridCell, ListingRecord, ListingStub};
use crate::services::normalize;
use crate::storage::{ListingSink, SaveOutcome};

pub const DEFAULT_ZOOM: f64 = 15.4;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Knobs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub zoom: f64,
    pub script_tag: String,
    pub workers: usize,
    /// Extra attempts for retryable failures (transport, 429, 5xx).
    pub max_retries: u32,
    /// Base pause before a retry; doubled on each further attempt.
    pub retry_delay: Duration,
    /// Ceiling for any single retry pause, `Retry-After` included.
    pub max_retry_delay: Duration,
    /// Skip the detail fetch for listings the sink already holds.
    pub skip_existing: bool,
    pub max_sessions: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            script_tag: DEFAULT_SCRIPT_TAG.to_string(),
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            skip_existing: false,
            max_sessions: None,
        }
    }
}

/// Shared state of one run: seen-set, counters, cancellation.
#[derive(Debug, Default)]
pub struct RunState {
    seen: Mutex<HashSet<String>>,
    pub counters: CrawlCounters,
    cancel: CancellationToken,
}

impl RunState {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            counters: CrawlCounters::default(),
            cancel,
        }
    }

    /// Record `listing_id`; false if it was already seen this run.
    pub async fn mark_seen(&self, listing_id: &str) -> bool {
        self.seen.lock().await.insert(listing_id.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn report(&self) -> CrawlReport {
        self.counters.snapshot(self.is_cancelled())
    }
}

/// How a record reaches the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveMode {
    Insert,
    Replace,
}

pub struct CrawlRun<F, S> {
    fetcher: Arc<F>,
    sink: Arc<S>,
    details: DetailRequestBuilder,
    config: CrawlConfig,
    state: Arc<RunState>,
}

impl<F, S> Clone for CrawlRun<F, S> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            sink: self.sink.clone(),
            details: self.details.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }
}

impl<F, S> CrawlRun<F, S>
where
    F: PageFetcher + 'static,
    S: ListingSink + 'static,
{
    pub fn new(
        fetcher: Arc<F>,
        sink: Arc<S>,
        details: DetailRequestBuilder,
        config: CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            sink,
            details,
            config,
            state: Arc::new(RunState::new(CancellationToken::new())),
        }
    }

    /// Share a cancellation token with the caller (e.g. a Ctrl-C handler).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.state = Arc::new(RunState::new(token));
        self
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl every template over every cell and store what is found.
    pub async fn run(&self, templates: &[SearchUrlTemplate], cells: &[GridCell]) -> CrawlReport {
        let mut sessions = Vec::with_capacity(templates.len() * cells.len());
        for template in templates {
            for (i, cell) in cells.iter().enumerate() {
                sessions.push(CrawlSession::new(
                    format!("{}#{}", template.strategy.label(), i),
                    template,
                    cell,
                    self.config.zoom,
                    &self.config.script_tag,
                ));
            }
        }
        if let Some(max) = self.config.max_sessions {
            sessions.truncate(max);
        }

        info!(
            "Starting crawl: {} sessions ({} templates x {} cells), {} workers",
            sessions.len(),
            templates.len(),
            cells.len(),
            self.config.workers
        );

        // Workers pop from the back; reverse so sessions run in build order.
        sessions.reverse();
        let queue = Arc::new(Mutex::new(sessions));

        self.run_workers(move |run| {
            let queue = queue.clone();
            async move {
                loop {
                    if run.state.is_cancelled() {
                        break;
                    }
                    let session = queue.lock().await.pop();
                    match session {
                        Some(session) => run.drive_session(session).await,
                        None => break,
                    }
                }
            }
        })
        .await;

        let report = self.state.report();
        info!("Crawl finished: {:?}", report);
        report
    }

    /// Re-fetch the detail record of every listing id and overwrite it.
    ///
    /// Search-card fields (title, coordinates, price, passport) come from
    /// the stored record; detail fields are extracted afresh.
    pub async fn refresh(&self, listing_ids: Vec<String>) -> CrawlReport {
        info!("Refreshing {} listings", listing_ids.len());

        let mut ids = listing_ids;
        ids.reverse();
        let queue = Arc::new(Mutex::new(ids));

        self.run_workers(move |run| {
            let queue = queue.clone();
            async move {
                loop {
                    if run.state.is_cancelled() {
                        break;
                    }
                    let id = queue.lock().await.pop();
                    let Some(listing_id) = id else { break };
                    let stub = match run.sink.get(&listing_id).await {
                        Ok(Some(stored)) => ListingStub {
                            listing_id,
                            ..ListingStub::from(&stored.raw)
                        },
                        Ok(None) => ListingStub {
                            listing_id,
                            ..Default::default()
                        },
                        Err(e) => {
                            warn!("Could not load stored listing {}: {}", listing_id, e);
                            CrawlCounters::incr(&run.state.counters.failed);
                            continue;
                        }
                    };
                    run.process_stub(stub, SaveMode::Replace).await;
                }
            }
        })
        .await;

        self.state.report()
    }

    /// Fetch, extract and normalize one listing without storing it.
    pub async fn fetch_listing(&self, stub: ListingStub) -> Result<ListingRecord> {
        let listing_id = stub.listing_id.clone();
        let request = self.details.build(&listing_id);
        let page = self.fetch_with_retry(&request).await?;
        CrawlCounters::incr(&self.state.counters.details_fetched);

        let payload = parse_json_body(&page.body, &page.url)?;
        let extraction = extract_detail(&payload, stub.into());
        if !extraction.gaps.is_empty() {
            debug!(
                "Listing {}: {} fields unresolved",
                listing_id,
                extraction.gaps.len()
            );
        }

        let normalized = normalize(&extraction.detail);
        CrawlCounters::incr(&self.state.counters.normalized);
        Ok(ListingRecord {
            normalized,
            raw: extraction.detail,
        })
    }

    async fn run_workers<W, Fut>(&self, worker: W)
    where
        W: Fn(Self) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handles: Vec<_> = (0..self.config.workers.max(1))
            .map(|_| tokio::spawn(worker(self.clone())))
            .collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Crawl worker panicked: {}", e);
            }
        }
    }

    async fn drive_session(&self, mut session: CrawlSession) {
        let counters = &self.state.counters;
        CrawlCounters::incr(&counters.sessions_started);

        let mut request = match session.start() {
            Ok(r) => r,
            Err(e) => {
                warn!("Session {} could not start: {}", session.label(), e);
                CrawlCounters::incr(&counters.sessions_failed);
                return;
            }
        };

        loop {
            let page = match self.fetch_with_retry(&request).await {
                Ok(page) => page,
                Err(HarvestError::Cancelled) => {
                    info!("Session {} cancelled", session.label());
                    return;
                }
                Err(e) => {
                    warn!("Session {} failed: {}", session.label(), e);
                    session.fail();
                    CrawlCounters::incr(&counters.sessions_failed);
                    return;
                }
            };
            CrawlCounters::incr(&counters.pages_fetched);

            let actions = match session.on_page(&page.body) {
                Ok(actions) => actions,
                Err(e) => {
                    warn!("Session {} failed: {}", session.label(), e);
                    CrawlCounters::incr(&counters.sessions_failed);
                    return;
                }
            };

            let mut next_page = None;
            for action in actions {
                match action {
                    CrawlAction::FetchDetail(stub) => {
                        if self.state.is_cancelled() {
                            continue;
                        }
                        self.process_stub(stub, SaveMode::Insert).await;
                    }
                    CrawlAction::FetchPage(url) => next_page = Some(url),
                }
            }

            match next_page {
                Some(url) => match session.begin_page(&url) {
                    Ok(r) => request = r,
                    Err(e) => {
                        warn!("Session {} failed: {}", session.label(), e);
                        session.fail();
                        CrawlCounters::incr(&counters.sessions_failed);
                        return;
                    }
                },
                None => {
                    CrawlCounters::incr(&counters.sessions_completed);
                    return;
                }
            }
        }
    }

    async fn process_stub(&self, stub: ListingStub, mode: SaveMode) {
        let counters = &self.state.counters;
        CrawlCounters::incr(&counters.listings_discovered);

        if !self.state.mark_seen(&stub.listing_id).await {
            CrawlCounters::incr(&counters.duplicates_skipped);
            return;
        }

        if mode == SaveMode::Insert && self.config.skip_existing {
            match self.sink.exists(&stub.listing_id).await {
                Ok(true) => {
                    debug!("Listing {} already stored, skipping", stub.listing_id);
                    CrawlCounters::incr(&counters.duplicates_skipped);
                    return;
                }
                Ok(false) => {}
                Err(e) => warn!("Existence check for {} failed: {}", stub.listing_id, e),
            }
        }

        let listing_id = stub.listing_id.clone();
        let record = match self.fetch_listing(stub).await {
            Ok(record) => record,
            Err(HarvestError::Cancelled) => return,
            Err(e) => {
                warn!("Listing {} failed: {}", listing_id, e);
                CrawlCounters::incr(&counters.failed);
                return;
            }
        };

        let outcome = match mode {
            SaveMode::Insert => self.sink.save(&record).await,
            SaveMode::Replace => self.sink.replace(&record).await,
        };
        match outcome {
            SaveOutcome::Created => CrawlCounters::incr(&counters.saved_created),
            SaveOutcome::Duplicate => CrawlCounters::incr(&counters.saved_duplicate),
            SaveOutcome::Updated => CrawlCounters::incr(&counters.saved_updated),
            SaveOutcome::Failed(reason) => {
                warn!("Sink rejected listing {}: {}", listing_id, reason);
                CrawlCounters::incr(&counters.failed);
            }
        }
    }

    /// Pause before retry number `attempt + 1`.
    fn retry_pause(&self, attempt: u32, err: &HarvestError) -> Duration {
        let pause = err.retry_after().unwrap_or_else(|| {
            self.config
                .retry_delay
                .saturating_mul(2u32.saturating_pow(attempt))
        });
        pause.min(self.config.max_retry_delay)
    }

    async fn fetch_with_retry(&self, request: &FetchRequest) -> Result<FetchedPage> {
        let mut attempt = 0;
        loop {
            if self.state.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            match self.fetcher.fetch(request).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.retry_pause(attempt, &e);
                    attempt += 1;
                    debug!(
                        "Retry {}/{} for {} in {:?}: {}",
                        attempt, self.config.max_retries, request.url, delay, e
                    );
                    tokio::select! {
                        _ = self.state.cancel.cancelled() => return Err(HarvestError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
