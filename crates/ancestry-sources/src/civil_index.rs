//! Civil/parish registration-index adapter (§4.2): births, marriages, and
//! death confirmations served from a single HTTP API, the live counterpart
//! to [`ancestry_core::sources::MockAdapter`]'s fixture tables.

use ancestry_core::error::{EngineError, EngineResult};
use ancestry_core::sources::{
    BirthEntry, BirthQuery, Capabilities, Capability, DeathEntry, MarriageEntry, MarriageQuery,
    SourceAdapter,
};
use ancestry_foundation::http::HttpClient;
use ancestry_foundation::retry::{with_backoff, RetryPolicy};
use ancestry_foundation::FoundationError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::rate_limit::RateLimiter;

fn is_transient(err: &FoundationError) -> bool {
    !matches!(
        err,
        FoundationError::Authentication(_)
            | FoundationError::InvalidInput(_)
            | FoundationError::UrlParse(_)
    )
}

fn build_url(base_url: &str, path: &str, pairs: &[(&str, String)]) -> EngineResult<Url> {
    let mut url = Url::parse(base_url.trim_end_matches('/'))
        .map_err(|e| EngineError::Foundation(FoundationError::UrlParse(e.to_string())))?;
    url.path_segments_mut()
        .map_err(|_| {
            EngineError::Foundation(FoundationError::UrlParse(
                "base URL cannot be a base".to_string(),
            ))
        })?
        .push(path);
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Adapter over a civil/parish registration index, exposing
/// `search_primary` and `confirmation` capabilities (§3 SourceDescriptor).
pub struct CivilIndexAdapter {
    name: String,
    base_url: String,
    client: HttpClient,
    capabilities: Capabilities,
    rate_limiter: RateLimiter,
    retry_policy: RetryPolicy,
}

impl CivilIndexAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        rate_limit_per_sec: f64,
        retry_budget: u32,
    ) -> ancestry_foundation::Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("ancestry-sources/0.1")?
            .build()?;
        let mut capabilities = Capabilities::new();
        capabilities.insert(Capability::SearchPrimary);
        capabilities.insert(Capability::Confirmation);
        Ok(Self {
            name: name.into(),
            base_url: base_url.into(),
            client,
            capabilities,
            rate_limiter: RateLimiter::new(rate_limit_per_sec),
            retry_policy: RetryPolicy::new(retry_budget, Duration::from_millis(500)),
        })
    }

    /// Construct with a bearer-token-authenticated client, for indexes that
    /// require a subscription credential.
    pub fn with_bearer_auth(
        name: impl Into<String>,
        base_url: impl Into<String>,
        token: &str,
        rate_limit_per_sec: f64,
        retry_budget: u32,
    ) -> ancestry_foundation::Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("ancestry-sources/0.1")?
            .bearer_auth(token)?
            .build()?;
        let mut capabilities = Capabilities::new();
        capabilities.insert(Capability::SearchPrimary);
        capabilities.insert(Capability::Confirmation);
        Ok(Self {
            name: name.into(),
            base_url: base_url.into(),
            client,
            capabilities,
            rate_limiter: RateLimiter::new(rate_limit_per_sec),
            retry_policy: RetryPolicy::new(retry_budget, Duration::from_millis(500)),
        })
    }
}

#[async_trait]
impl SourceAdapter for CivilIndexAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn is_available(&self) -> bool {
        self.rate_limiter.wait().await;
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        match self.client.download(&url).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(source = %self.name, error = %err, "civil index health check failed");
                false
            }
        }
    }

    async fn search_births(&self, query: &BirthQuery) -> EngineResult<Vec<BirthEntry>> {
        self.rate_limiter.wait().await;
        let mut pairs = vec![
            ("surname", query.surname.clone()),
            ("given", query.given.clone()),
            ("year_from", query.year_from.to_string()),
            ("year_to", query.year_to.to_string()),
        ];
        if let Some(district) = &query.district {
            pairs.push(("district", district.clone()));
        }
        let url = build_url(&self.base_url, "births", &pairs)?;

        let entries = with_backoff(
            self.retry_policy,
            || async { self.client.download_json::<Vec<BirthEntry>>(url.as_str()).await },
            is_transient,
        )
        .await?;
        Ok(entries)
    }

    async fn search_marriages(&self, query: &MarriageQuery) -> EngineResult<Vec<MarriageEntry>> {
        self.rate_limiter.wait().await;
        let mut pairs = vec![
            ("surname", query.surname.clone()),
            ("year_from", query.year_from.to_string()),
            ("year_to", query.year_to.to_string()),
        ];
        if let Some(given) = &query.given {
            pairs.push(("given", given.clone()));
        }
        if let Some(district) = &query.district {
            pairs.push(("district", district.clone()));
        }
        let url = build_url(&self.base_url, "marriages", &pairs)?;

        let entries = with_backoff(
            self.retry_policy,
            || async { self.client.download_json::<Vec<MarriageEntry>>(url.as_str()).await },
            is_transient,
        )
        .await?;
        Ok(entries)
    }

    async fn confirm_death(
        &self,
        given: &str,
        surname: &str,
        year: i32,
    ) -> EngineResult<Option<DeathEntry>> {
        self.rate_limiter.wait().await;
        let pairs = vec![
            ("given", given.to_string()),
            ("surname", surname.to_string()),
            ("year", year.to_string()),
        ];
        let url = build_url(&self.base_url, "deaths", &pairs)?;

        let entry = with_backoff(
            self.retry_policy,
            || async { self.client.download_json::<Option<DeathEntry>>(url.as_str()).await },
            is_transient,
        )
        .await?;
        Ok(entry)
    }

    async fn search_person(
        &self,
        _query: &ancestry_core::sources::PersonSearchQuery,
    ) -> EngineResult<Vec<ancestry_core::sources::PersonCandidate>> {
        Ok(Vec::new())
    }

    async fn get_parents(&self, _person_id: &str) -> EngineResult<ancestry_core::sources::ParentLinks> {
        Ok(ancestry_core::sources::ParentLinks::default())
    }

    async fn extract_facts(&self, _person_id: &str) -> EngineResult<ancestry_core::sources::FactSet> {
        Ok(ancestry_core::sources::FactSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_url_with_optional_district() {
        let url = build_url(
            "https://civil.example/api/",
            "births",
            &[
                ("surname", "Smith".to_string()),
                ("year_from", "1945".to_string()),
                ("year_to", "1950".to_string()),
                ("district", "Derby".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(url.path(), "/api/births");
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query.get("surname"), Some(&"Smith".to_string()));
        assert_eq!(query.get("district"), Some(&"Derby".to_string()));
    }

    #[test]
    fn new_adapter_exposes_expected_capabilities() {
        let adapter = CivilIndexAdapter::new("civil-index", "https://civil.example/api", 2.0, 3)
            .expect("client builds");
        assert!(adapter.has_capability(Capability::SearchPrimary));
        assert!(adapter.has_capability(Capability::Confirmation));
        assert!(!adapter.has_capability(Capability::PersonSearch));
    }
}
