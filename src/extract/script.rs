//! Locate the JSON state embedded in a search page.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{HarvestError, Result};

/// Id of the script tag carrying the deferred page state.
pub const DEFAULT_SCRIPT_TAG: &str = "data-deferred-state-0";

/// Parse the text of `<script id="{tag_id}">` in `html` as JSON.
///
/// A missing tag, an empty tag or invalid JSON is a [`HarvestError::MalformedPage`].
pub fn extract_script_json(html: &str, tag_id: &str, url: &str) -> Result<Value> {
    if tag_id.is_empty() || tag_id.contains('"') {
        return Err(HarvestError::Config(format!(
            "invalid script tag id: {:?}",
            tag_id
        )));
    }
    let selector = Selector::parse(&format!(r#"script[id="{}"]"#, tag_id))
        .map_err(|e| HarvestError::Config(format!("bad script selector: {:?}", e)))?;

    let document = Html::parse_document(html);
    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| HarvestError::malformed(url, format!("no <script id=\"{}\">", tag_id)))?;

    let text: String = script.text().collect();
    if text.trim().is_empty() {
        return Err(HarvestError::malformed(url, "script payload is empty"));
    }

    serde_json::from_str(&text)
        .map_err(|e| HarvestError::malformed(url, format!("script payload is not JSON: {}", e)))
}

/// Parse a raw JSON response body (detail API responses).
pub fn parse_json_body(body: &str, url: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| HarvestError::malformed(url, format!("response is not JSON: {}", e)))
}
