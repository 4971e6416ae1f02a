//! End-to-end crawl runs against a scripted fetcher and in-memory sink.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Month, NaiveDate};
use serde_json::{json, Value};

use harvester::discovery::{partition, City, SearchUrlBuilder, SearchUrlTemplate};
use harvester::error::{HarvestError, Result};
use harvester::models::{BoundingBox, HostProfile, ListingDetail, ListingRecord, NormalizedListing};
use harvester::scrapers::{
    composite_key, CrawlConfig, CrawlRun, DetailRequestBuilder, FetchRequest, FetchedPage,
    PageFetcher, RequestKind,
};
use harvester::storage::{ListingSink, MemorySink};

const DETAIL_TEMPLATE: &str = "https://api.test/detail?id={}";

/// Serves search pages keyed by cursor ("" for the first page) and detail
/// payloads keyed by listing id. Listings in `broken` always answer 500.
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, String>,
    details: HashMap<String, String>,
    broken: HashSet<String>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    fn page(mut self, cursor: &str, ids: &[&str], cursors: &[&str]) -> Self {
        self.pages.insert(cursor.to_string(), search_page(ids, cursors));
        self
    }

    fn detail(mut self, id: &str, payload: Value) -> Self {
        self.details.insert(composite_key(id), payload.to_string());
        self
    }

    fn broken(mut self, id: &str) -> Self {
        self.broken.insert(composite_key(id));
        self
    }

    fn requests(&self, kind: RequestKind) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.url.clone())
            .collect()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage> {
        self.requests.lock().unwrap().push(request.clone());
        let not_found = || HarvestError::Status {
            url: request.url.clone(),
            status: 404,
        };

        match request.kind {
            RequestKind::SearchPage => {
                let cursor = request.url.split("&cursor=").nth(1).unwrap_or("");
                let body = self.pages.get(cursor).ok_or_else(not_found)?;
                Ok(FetchedPage::ok(&request.url, body.as_str()))
            }
            RequestKind::Detail => {
                let key = request.url.split("id=").nth(1).unwrap_or("");
                if self.broken.contains(key) {
                    return Err(HarvestError::Status {
                        url: request.url.clone(),
                        status: 500,
                    });
                }
                let body = self.details.get(key).ok_or_else(not_found)?;
                Ok(FetchedPage::ok(&request.url, body.as_str()))
            }
        }
    }
}

fn search_page(ids: &[&str], cursors: &[&str]) -> String {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({"listing": {
                "id": id,
                "title": format!("Listing {}", id),
                "name": format!("Suite {}", id),
                "coordinate": {"latitude": 49.25, "longitude": -123.1},
                "roomTypeCategory": "entire_home"
            }})
        })
        .collect();
    let payload = json!({
        "niobeMinimalClientData": [["StaysSearch", {
            "data": {"presentation": {"staysSearch": {"results": {
                "searchResults": results,
                "paginationInfo": {"pageCursors": cursors}
            }}}}
        }]]
    });
    format!(
        r#"<!doctype html><html><body><script id="data-deferred-state-0" type="application/json">{}</script></body></html>"#,
        payload
    )
}

fn full_detail() -> Value {
    json!({"data": {"presentation": {"stayProductDetailPage": {"sections": {
        "sections": [
            {"sectionComponentType": "BOOK_IT_SIDEBAR", "section": {"maxGuestCapacity": 4}},
            {"sectionId": "LOCATION_DEFAULT", "section": {"subtitle": "Vancouver, British Columbia, Canada"}},
            {"sectionComponentType": "PDP_DESCRIPTION_MODAL", "section": {"items": [
                {"title": "Registration details", "html": {"htmlText":
                    "Municipal registration number: 123456<br />Provincial registration number: ABC123"}}
            ]}},
            {"sectionComponentType": "AVAILABILITY_CALENDAR_DEFAULT", "section": {"descriptionItems": [
                {"title": "2 beds"},
                {"title": "1.5 shared baths"}
            ]}},
            {"sectionId": "MEET_YOUR_HOST", "section": {"cardData": {
                "name": "Ada", "userId": "VXNlcjo0MjQy", "isSuperhost": true
            }}}
        ],
        "metadata": {}
    }}}}})
}

fn templates() -> Vec<SearchUrlTemplate> {
    let builder =
        SearchUrlBuilder::default().with_today(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    vec![builder.flexible_week(&[Month::July])]
}

fn one_cell() -> Vec<harvester::models::GridCell> {
    partition(&City::Vancouver.bounding_box(), 1).unwrap()
}

fn config() -> CrawlConfig {
    CrawlConfig {
        workers: 2,
        max_retries: 1,
        retry_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn crawl(
    fetcher: ScriptedFetcher,
    sink: Arc<MemorySink>,
    config: CrawlConfig,
) -> CrawlRun<ScriptedFetcher, MemorySink> {
    CrawlRun::new(
        Arc::new(fetcher),
        sink,
        DetailRequestBuilder::new(DETAIL_TEMPLATE, Some("test-key".into())).unwrap(),
        config,
    )
}

#[tokio::test]
async fn test_paginated_session_report() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("", &["1", "2"], &["c1", "c2"])
            .page("c2", &["2", "3"], &["ignored"])
            .page("c1", &["4"], &[])
            .detail("1", full_detail())
            .detail("2", json!({}))
            .detail("4", json!({}))
            .broken("3"),
    );
    let sink = Arc::new(MemorySink::new());
    let run = CrawlRun::new(
        fetcher.clone(),
        sink.clone(),
        DetailRequestBuilder::new(DETAIL_TEMPLATE, Some("test-key".into())).unwrap(),
        config(),
    );

    let report = run.run(&templates(), &one_cell()).await;

    assert_eq!(report.sessions_started, 1);
    assert_eq!(report.sessions_completed, 1);
    assert_eq!(report.sessions_failed, 0);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.listings_discovered, 5);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.details_fetched, 3);
    assert_eq!(report.normalized, 3);
    assert_eq!(report.saved_created, 3);
    assert_eq!(report.failed, 1);
    assert!(!report.cancelled);

    // Cursors are consumed last-to-first.
    let pages = fetcher.requests(RequestKind::SearchPage);
    assert_eq!(pages.len(), 3);
    assert!(pages[1].ends_with("&cursor=c2"));
    assert!(pages[2].ends_with("&cursor=c1"));

    // The broken listing was retried once, then given up on.
    let details = fetcher.requests(RequestKind::Detail);
    assert_eq!(details.len(), 5);

    assert_eq!(sink.listing_ids().await.unwrap(), vec!["1", "2", "4"]);
    let record = sink.get("1").await.unwrap().unwrap();
    let n = &record.normalized;
    assert_eq!(n.title, "Listing 1");
    assert_eq!(n.name, "Suite 1");
    assert_eq!(n.person_capacity, Some(4));
    assert_eq!(n.location, "Vancouver, British Columbia, Canada");
    assert_eq!(n.beds, Some(2));
    assert_eq!(n.baths, Some(1.5));
    assert!(n.bath_is_shared);
    assert_eq!(n.registration_number, "123456;ABC123");
    assert_eq!(n.registration.provincial.as_deref(), Some("ABC123"));
    assert_eq!(n.host.user_id, "4242");
    assert!(n.host.is_superhost);
    assert_eq!(record.raw.title, "Listing 1");
}

#[tokio::test]
async fn test_detail_requests_carry_api_key() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("", &["9"], &[])
            .detail("9", json!({})),
    );
    let run = CrawlRun::new(
        fetcher.clone(),
        Arc::new(MemorySink::new()),
        DetailRequestBuilder::new(DETAIL_TEMPLATE, Some("test-key".into())).unwrap(),
        config(),
    );
    run.run(&templates(), &one_cell()).await;

    let requests = fetcher.requests.lock().unwrap();
    let detail = requests
        .iter()
        .find(|r| r.kind == RequestKind::Detail)
        .unwrap();
    assert_eq!(
        detail.url,
        format!("https://api.test/detail?id={}", composite_key("9"))
    );
    assert!(detail
        .headers
        .contains(&("X-Airbnb-Api-Key".to_string(), "test-key".to_string())));
}

#[tokio::test]
async fn test_malformed_first_page_fails_session_only() {
    let mut fetcher = ScriptedFetcher::default();
    fetcher
        .pages
        .insert(String::new(), "<html>Please verify you are human</html>".into());

    let sink = Arc::new(MemorySink::new());
    let report = crawl(fetcher, sink.clone(), config())
        .run(&templates(), &one_cell())
        .await;

    assert_eq!(report.sessions_started, 1);
    assert_eq!(report.sessions_failed, 1);
    assert_eq!(report.sessions_completed, 0);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.details_fetched, 0);
    assert!(sink.is_empty().await);
}

#[tokio::test]
async fn test_listings_deduplicated_across_sessions() {
    // Every cell returns the same two listings.
    let fetcher = ScriptedFetcher::default()
        .page("", &["1", "2"], &[])
        .detail("1", json!({}))
        .detail("2", json!({}));

    let bbox = BoundingBox::new(-123.2, 49.2, -123.0, 49.3).unwrap();
    let cells = partition(&bbox, 4).unwrap();

    let sink = Arc::new(MemorySink::new());
    let report = crawl(fetcher, sink.clone(), config())
        .run(&templates(), &cells)
        .await;

    assert_eq!(report.sessions_started, 4);
    assert_eq!(report.sessions_completed, 4);
    assert_eq!(report.listings_discovered, 8);
    assert_eq!(report.duplicates_skipped, 6);
    assert_eq!(report.details_fetched, 2);
    assert_eq!(report.saved_created, 2);
    assert_eq!(sink.len().await, 2);
}

#[tokio::test]
async fn test_max_sessions_limits_run() {
    let fetcher = ScriptedFetcher::default().page("", &[], &[]);
    let bbox = BoundingBox::new(-123.2, 49.2, -123.0, 49.3).unwrap();
    let cells = partition(&bbox, 9).unwrap();

    let report = crawl(
        fetcher,
        Arc::new(MemorySink::new()),
        CrawlConfig {
            max_sessions: Some(2),
            ..config()
        },
    )
    .run(&templates(), &cells)
    .await;

    assert_eq!(report.sessions_started, 2);
    assert_eq!(report.pages_fetched, 2);
}

fn stored(id: &str) -> ListingRecord {
    ListingRecord {
        normalized: NormalizedListing {
            listing_id: id.into(),
            title: "old title".into(),
            ..Default::default()
        },
        raw: ListingDetail {
            listing_id: id.into(),
            title: "old title".into(),
            latitude: Some(49.25),
            longitude: Some(-123.1),
            room_type: "entire_home".into(),
            registration_number: "999;".into(),
            host: HostProfile {
                name: "Passport".into(),
                thumbnail_url: "https://example.com/t.jpg".into(),
                ..Default::default()
            },
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_skip_existing_and_sink_duplicates() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("", &["1", "2"], &[])
            .detail("1", json!({}))
            .detail("2", json!({})),
    );
    let sink = Arc::new(MemorySink::new());
    sink.save(&stored("1")).await;

    // Without skipping, the stored listing is fetched and reported as a duplicate.
    let report = CrawlRun::new(
        fetcher.clone(),
        sink.clone(),
        DetailRequestBuilder::new(DETAIL_TEMPLATE, None).unwrap(),
        config(),
    )
    .run(&templates(), &one_cell())
    .await;
    assert_eq!(report.details_fetched, 2);
    assert_eq!(report.saved_created, 1);
    assert_eq!(report.saved_duplicate, 1);

    // With skipping, neither stored listing is fetched again.
    let before = fetcher.requests(RequestKind::Detail).len();
    let report = CrawlRun::new(
        fetcher.clone(),
        sink.clone(),
        DetailRequestBuilder::new(DETAIL_TEMPLATE, None).unwrap(),
        CrawlConfig {
            skip_existing: true,
            ..config()
        },
    )
    .run(&templates(), &one_cell())
    .await;
    assert_eq!(report.details_fetched, 0);
    assert_eq!(report.duplicates_skipped, 2);
    assert_eq!(fetcher.requests(RequestKind::Detail).len(), before);
}

#[tokio::test]
async fn test_refresh_updates_detail_and_keeps_search_fields() {
    let fetcher = ScriptedFetcher::default()
        .detail("1", full_detail())
        .detail("2", json!({}));
    let sink = Arc::new(MemorySink::new());
    sink.save(&stored("1")).await;
    sink.save(&stored("2")).await;

    let run = crawl(fetcher, sink.clone(), config());
    let ids = sink.listing_ids().await.unwrap();
    let report = run.refresh(ids).await;

    assert_eq!(report.sessions_started, 0);
    assert_eq!(report.details_fetched, 2);
    assert_eq!(report.saved_updated, 2);
    assert_eq!(report.saved_created, 0);

    let refreshed = sink.get("1").await.unwrap().unwrap();
    let n = &refreshed.normalized;
    assert_eq!(n.registration_number, "123456;ABC123");
    assert_eq!(n.person_capacity, Some(4));
    assert_eq!(n.title, "old title");
    assert_eq!(n.latitude, Some(49.25));
    assert_eq!(n.longitude, Some(-123.1));
    assert_eq!(n.room_type, "entire_home");
    assert_eq!(n.host.name, "Ada");
    assert_eq!(n.host.thumbnail_url, "https://example.com/t.jpg");

    // The second payload is empty: search fields survive, stale detail fields do not.
    let empty = sink.get("2").await.unwrap().unwrap();
    assert_eq!(empty.normalized.title, "old title");
    assert_eq!(empty.normalized.latitude, Some(49.25));
    assert_eq!(empty.normalized.registration_number, "");
}

#[tokio::test]
async fn test_refresh_of_unknown_id_starts_from_id() {
    let fetcher = ScriptedFetcher::default().detail("5", full_detail());
    let sink = Arc::new(MemorySink::new());

    let report = crawl(fetcher, sink.clone(), config())
        .refresh(vec!["5".into()])
        .await;

    assert_eq!(report.saved_created, 1);
    let record = sink.get("5").await.unwrap().unwrap();
    assert_eq!(record.normalized.listing_id, "5");
    assert_eq!(record.normalized.title, "");
    assert_eq!(record.normalized.person_capacity, Some(4));
}
