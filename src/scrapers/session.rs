//! Paginated crawl of one (template, cell) search.
//!
//! A session is a small state machine. It produces [`CrawlAction`]s and
//! never performs I/O itself; the run loop executes the actions and feeds
//! page bodies back in.
//!
//! ```text
//! Init -> Fetching -> Extracting -> Paginating -> Fetching -> ...
//!                                \-> Done
//! any state -> Failed
//! ```
//!
//! Cursors are read once from the first page and consumed last-to-first,
//! so pages are crawled in reverse of the order the site lists them.

use tracing::{debug, info};

use super::fetcher::FetchRequest;
use crate::discovery::SearchUrlTemplate;
use crate::error::{HarvestError, Result};
use crate::extract::{extract_cursors, extract_script_json, extract_search_page};
use crate::models::{GridCell, ListingStub};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Fetching,
    Extracting,
    Paginating,
    Done,
    Failed,
}

/// Follow-up work produced by a page.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlAction {
    FetchDetail(ListingStub),
    FetchPage(String),
}

#[derive(Debug)]
pub struct CrawlSession {
    label: String,
    resolved_url: String,
    script_tag: String,
    state: SessionState,
    cursors: Option<Vec<String>>,
    current_url: Option<String>,
    pages_processed: usize,
    stubs_emitted: usize,
}

impl CrawlSession {
    pub fn new(
        label: impl Into<String>,
        template: &SearchUrlTemplate,
        cell: &GridCell,
        zoom: f64,
        script_tag: &str,
    ) -> Self {
        Self {
            label: label.into(),
            resolved_url: template.resolve(cell, zoom),
            script_tag: script_tag.to_string(),
            state: SessionState::Init,
            cursors: None,
            current_url: None,
            pages_processed: 0,
            stubs_emitted: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn resolved_url(&self) -> &str {
        &self.resolved_url
    }

    pub fn pages_processed(&self) -> usize {
        self.pages_processed
    }

    pub fn stubs_emitted(&self) -> usize {
        self.stubs_emitted
    }

    /// Cursors not yet consumed; `None` before the first page.
    pub fn remaining_cursors(&self) -> Option<usize> {
        self.cursors.as_ref().map(Vec::len)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Done | SessionState::Failed)
    }

    /// `Init -> Fetching`: the first page request.
    pub fn start(&mut self) -> Result<FetchRequest> {
        self.expect_state(SessionState::Init, "start")?;
        self.state = SessionState::Fetching;
        self.current_url = Some(self.resolved_url.clone());
        info!("Session {} started", self.label);
        Ok(FetchRequest::search(self.resolved_url.clone()))
    }

    /// `Paginating -> Fetching`: the scheduler is issuing the next page.
    pub fn begin_page(&mut self, url: &str) -> Result<FetchRequest> {
        self.expect_state(SessionState::Paginating, "begin_page")?;
        self.state = SessionState::Fetching;
        self.current_url = Some(url.to_string());
        Ok(FetchRequest::search(url))
    }

    /// Handle a fetched search page: extract stubs, then paginate or finish.
    ///
    /// A missing or unparsable payload fails the session with
    /// [`HarvestError::MalformedPage`].
    pub fn on_page(&mut self, html: &str) -> Result<Vec<CrawlAction>> {
        self.expect_state(SessionState::Fetching, "on_page")?;
        self.state = SessionState::Extracting;

        let url = self
            .current_url
            .clone()
            .unwrap_or_else(|| self.resolved_url.clone());

        let payload = match extract_script_json(html, &self.script_tag, &url) {
            Ok(p) => p,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        if self.cursors.is_none() {
            let cursors = extract_cursors(&payload);
            debug!("Session {}: {} page cursors", self.label, cursors.len());
            self.cursors = Some(cursors);
        }

        let page = extract_search_page(&payload);
        self.pages_processed += 1;
        self.stubs_emitted += page.stubs.len();
        debug!(
            "Session {}: page {} yielded {} stubs ({} dropped)",
            self.label,
            self.pages_processed,
            page.stubs.len(),
            page.dropped
        );

        let mut actions: Vec<CrawlAction> =
            page.stubs.into_iter().map(CrawlAction::FetchDetail).collect();

        match self.cursors.as_mut().and_then(Vec::pop) {
            Some(cursor) => {
                self.state = SessionState::Paginating;
                actions.push(CrawlAction::FetchPage(format!(
                    "{}&cursor={}",
                    self.resolved_url, cursor
                )));
            }
            None => {
                self.state = SessionState::Done;
                info!(
                    "Session {} done: {} pages, {} listings",
                    self.label, self.pages_processed, self.stubs_emitted
                );
            }
        }

        Ok(actions)
    }

    /// A fetch for this session failed terminally.
    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
    }

    fn expect_state(&self, expected: SessionState, op: &str) -> Result<()> {
        if self.state != expected {
            return Err(HarvestError::InvalidInput(format!(
                "session {}: {} called in state {:?}",
                self.label, op, self.state
            )));
        }
        Ok(())
    }
}
