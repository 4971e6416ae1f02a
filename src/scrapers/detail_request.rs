//! Detail API requests for individual listings.
//!
//! The detail endpoint is a persisted GraphQL query keyed by a composite
//! id: `base64("StayListing:" + urlencode(listing_id))`, with spaces
//! encoded as `+`. The key is substituted into the `{}` of the URL template.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::fetcher::FetchRequest;
use crate::error::{HarvestError, Result};

pub const DEFAULT_DETAIL_URL_TEMPLATE: &str = "https://www.airbnb.ca/api/v3/StaysPdpSections/08e3ad2e3d75c9bede923485718ff2e7f6efe2ca1febb5192d78c51e17e8b4ca?operationName=StaysPdpSections&locale=en-CA&currency=CAD&variables=%7B%22id%22%3A%22{}%22%2C%22pdpSectionsRequest%22%3A%7B%22adults%22%3A%221%22%2C%22layouts%22%3A%5B%22SINGLE_COLUMN%22%5D%7D%7D&extensions=%7B%22persistedQuery%22%3A%7B%22version%22%3A1%2C%22sha256Hash%22%3A%2237d7cbb631196506c3990783fe194d81432d0fbf7362c668e547bb6475e71b37%22%7D%7D";

pub const API_KEY_HEADER: &str = "X-Airbnb-Api-Key";

const COMPOSITE_TYPE: &str = "StayListing";

/// Composite key for a listing id.
pub fn composite_key(listing_id: &str) -> String {
    let encoded = urlencoding::encode(listing_id).replace("%20", "+");
    STANDARD.encode(format!("{}:{}", COMPOSITE_TYPE, encoded))
}

/// Builds detail requests from a URL template and API key.
#[derive(Debug, Clone)]
pub struct DetailRequestBuilder {
    template: String,
    api_key: Option<String>,
}

impl DetailRequestBuilder {
    pub fn new(template: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{}") {
            return Err(HarvestError::Config(
                "detail URL template has no {} placeholder".to_string(),
            ));
        }
        Ok(Self { template, api_key })
    }

    pub fn url(&self, listing_id: &str) -> String {
        self.template.replacen("{}", &composite_key(listing_id), 1)
    }

    pub fn build(&self, listing_id: &str) -> FetchRequest {
        let request = FetchRequest::detail(self.url(listing_id));
        match &self.api_key {
            Some(key) => request.with_header(API_KEY_HEADER, key),
            None => request,
        }
    }
}

impl Default for DetailRequestBuilder {
    fn default() -> Self {
        Self {
            template: DEFAULT_DETAIL_URL_TEMPLATE.to_string(),
            api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key_numeric() {
        // base64("StayListing:12345")
        assert_eq!(composite_key("12345"), "U3RheUxpc3Rpbmc6MTIzNDU=");
    }

    #[test]
    fn test_composite_key_escapes() {
        let decoded = |s: String| String::from_utf8(STANDARD.decode(s).unwrap()).unwrap();
        assert_eq!(decoded(composite_key("a b")), "StayListing:a+b");
        assert_eq!(decoded(composite_key("x(1)")), "StayListing:x%281%29");
        assert_eq!(decoded(composite_key("a/b")), "StayListing:a%2Fb");
    }

    #[test]
    fn test_build_request() {
        let builder = DetailRequestBuilder::new(
            "https://example.com/api?id=%22{}%22",
            Some("secret".to_string()),
        )
        .unwrap();
        let request = builder.build("12345");
        assert_eq!(
            request.url,
            "https://example.com/api?id=%22U3RheUxpc3Rpbmc6MTIzNDU=%22"
        );
        assert_eq!(
            request.headers,
            vec![(API_KEY_HEADER.to_string(), "secret".to_string())]
        );
    }

    #[test]
    fn test_default_template_has_one_placeholder() {
        assert_eq!(DEFAULT_DETAIL_URL_TEMPLATE.matches("{}").count(), 1);
        let url = DetailRequestBuilder::default().url("1");
        assert!(url.contains("%22U3RheUxpc3Rpbmc6MQ==%22"));
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        assert!(DetailRequestBuilder::new("https://example.com", None).is_err());
    }
}
