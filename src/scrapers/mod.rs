//! Network side of the crawl: requests, admission, sessions and the run loop.

pub mod detail_request;
pub mod fetcher;
mod http_client;
pub mod rate_limiter;
pub mod run;
pub mod session;

pub use detail_request::{composite_key, DetailRequestBuilder, DEFAULT_DETAIL_URL_TEMPLATE};
pub use fetcher::{FetchRequest, PageFetcher, RequestKind};
pub use http_client::{resolve_user_agent, FetchedPage, HttpClient, USER_AGENT};
pub use rate_limiter::{Admission, HostStats, RateLimitConfig, RateLimiter};
pub use run::{CrawlConfig, CrawlRun, RunState};
pub use session::{CrawlAction, CrawlSession, SessionState};
