//! Registration number policies.
//!
//! A stored registration number is checked against the municipal format
//! rule and, optionally, against the city's public business licence
//! registry.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarvestError, Result};

/// Public licence registry endpoint for Vancouver.
pub const BUSINESS_LICENCE_URL: &str =
    "https://opendata.vancouver.ca/api/explore/v2.1/catalog/datasets/business-licences/records";

/// Outcome of one policy check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub policy: String,
    pub registration_number: String,
    pub passed: bool,
    /// Extra context, such as the registry status.
    pub detail: Option<String>,
}

/// A rule applied to a registration number.
#[async_trait]
pub trait Policy: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn evaluate(&self, registration_number: &str) -> Result<PolicyResult>;
}

static REGISTRATION_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}-[0-9]{6}$").unwrap());

/// `YY-NNNNNN` with a two-digit issue year in a known range.
#[derive(Debug, Clone)]
pub struct ValidRegistrationNumberPolicy {
    pub start_year: u32,
    pub end_year: u32,
}

impl Default for ValidRegistrationNumberPolicy {
    fn default() -> Self {
        Self {
            start_year: 13,
            end_year: 24,
        }
    }
}

impl ValidRegistrationNumberPolicy {
    pub fn is_valid(&self, registration_number: &str) -> bool {
        if !REGISTRATION_FORMAT.is_match(registration_number) {
            return false;
        }
        registration_number[..2]
            .parse::<u32>()
            .map(|year| (self.start_year..=self.end_year).contains(&year))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Policy for ValidRegistrationNumberPolicy {
    fn name(&self) -> &'static str {
        "valid-registration-number"
    }

    fn description(&self) -> &'static str {
        "Registration number matches YY-NNNNNN with a plausible issue year"
    }

    async fn evaluate(&self, registration_number: &str) -> Result<PolicyResult> {
        Ok(PolicyResult {
            policy: self.name().to_string(),
            registration_number: registration_number.to_string(),
            passed: self.is_valid(registration_number),
            detail: None,
        })
    }
}

/// Source of licence statuses.
#[async_trait]
pub trait LicenceRegistry: Send + Sync {
    /// Latest status for a licence number, `None` if unknown.
    async fn licence_status(&self, licence_number: &str) -> Result<Option<String>>;
}

/// Client for the Vancouver open data business licence dataset.
#[derive(Debug, Clone)]
pub struct BusinessLicenceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LicenceRecords {
    #[serde(default)]
    results: Vec<LicenceRecord>,
}

#[derive(Debug, Deserialize)]
struct LicenceRecord {
    status: Option<String>,
}

impl BusinessLicenceClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(BUSINESS_LICENCE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Query parameters for the latest revision of one short-term rental licence.
    pub fn query_params(licence_number: &str) -> Vec<(String, String)> {
        merge_query_params(&[
            ("where", r#"businesstype="Short-term Rental Operator""#.to_string()),
            ("where", format!(r#"licencenumber="{}""#, licence_number)),
            ("order_by", "licencerevisionnumber desc".to_string()),
            ("select", "status".to_string()),
        ])
    }
}

/// Merge parameters, joining repeated keys with `" and "`; first-seen key order.
pub fn merge_query_params(params: &[(&str, String)]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::new();
    for (key, value) in params {
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => {
                existing.push_str(" and ");
                existing.push_str(value);
            }
            None => merged.push((key.to_string(), value.clone())),
        }
    }
    merged
}

#[async_trait]
impl LicenceRegistry for BusinessLicenceClient {
    async fn licence_status(&self, licence_number: &str) -> Result<Option<String>> {
        let params = Self::query_params(licence_number);
        debug!("Looking up licence {}", licence_number);

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| HarvestError::transport(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Status {
                url: self.base_url.clone(),
                status: status.as_u16(),
            });
        }

        let records: LicenceRecords = response
            .json()
            .await
            .map_err(|e| HarvestError::malformed(&self.base_url, e.to_string()))?;

        Ok(records.results.into_iter().next().and_then(|r| r.status))
    }
}

/// Passes when the registry's latest status for the number is "Issued".
pub struct IssuedRegistrationNumberPolicy<R: LicenceRegistry> {
    registry: R,
}

impl<R: LicenceRegistry> IssuedRegistrationNumberPolicy<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl<R: LicenceRegistry> Policy for IssuedRegistrationNumberPolicy<R> {
    fn name(&self) -> &'static str {
        "issued-registration-number"
    }

    fn description(&self) -> &'static str {
        "Registration number has an issued short-term rental licence"
    }

    async fn evaluate(&self, registration_number: &str) -> Result<PolicyResult> {
        let status = self.registry.licence_status(registration_number).await?;
        Ok(PolicyResult {
            policy: self.name().to_string(),
            registration_number: registration_number.to_string(),
            passed: status.as_deref() == Some("Issued"),
            detail: Some(status.unwrap_or_else(|| "not found".to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedRegistry(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl LicenceRegistry for FixedRegistry {
        async fn licence_status(&self, licence_number: &str) -> Result<Option<String>> {
            Ok(self.0.get(licence_number).map(|s| s.to_string()))
        }
    }

    #[test]
    fn test_registration_format() {
        let policy = ValidRegistrationNumberPolicy::default();
        assert!(policy.is_valid("24-159412"));
        assert!(policy.is_valid("13-000001"));
        assert!(!policy.is_valid("12-159412"));
        assert!(!policy.is_valid("25-159412"));
        assert!(!policy.is_valid("24159412"));
        assert!(!policy.is_valid("24-15941"));
        assert!(!policy.is_valid(""));
    }

    #[test]
    fn test_query_params_merge_where() {
        let params = BusinessLicenceClient::query_params("24-159412");
        assert_eq!(
            params,
            vec![
                (
                    "where".to_string(),
                    r#"businesstype="Short-term Rental Operator" and licencenumber="24-159412""#
                        .to_string()
                ),
                ("order_by".to_string(), "licencerevisionnumber desc".to_string()),
                ("select".to_string(), "status".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_issued_policy() {
        let registry = FixedRegistry(HashMap::from([
            ("24-159412", "Issued"),
            ("24-243792", "Cancelled"),
        ]));
        let policy = IssuedRegistrationNumberPolicy::new(registry);

        assert!(policy.evaluate("24-159412").await.unwrap().passed);
        let cancelled = policy.evaluate("24-243792").await.unwrap();
        assert!(!cancelled.passed);
        assert_eq!(cancelled.detail.as_deref(), Some("Cancelled"));
        let missing = policy.evaluate("99-999999").await.unwrap();
        assert!(!missing.passed);
        assert_eq!(missing.detail.as_deref(), Some("not found"));
    }

    #[tokio::test]
    async fn test_valid_policy_evaluate() {
        let result = ValidRegistrationNumberPolicy::default()
            .evaluate("23-123456")
            .await
            .unwrap();
        assert!(result.passed);
        assert_eq!(result.policy, "valid-registration-number");
    }
}
