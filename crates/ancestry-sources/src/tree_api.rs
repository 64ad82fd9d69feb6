//! Genealogy-tree API adapter (§4.2): person search, parent links, and
//! fact extraction against a hosted family-tree service.

use ancestry_core::error::{EngineError, EngineResult};
use ancestry_core::sources::{
    BirthEntry, BirthQuery, Capabilities, Capability, DeathEntry, FactSet, MarriageEntry,
    MarriageQuery, ParentLinks, PersonCandidate, PersonSearchQuery, SourceAdapter,
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

fn build_url(base_url: &str, segments: &[&str], pairs: &[(&str, String)]) -> EngineResult<Url> {
    let mut url = Url::parse(base_url.trim_end_matches('/'))
        .map_err(|e| EngineError::Foundation(FoundationError::UrlParse(e.to_string())))?;
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            EngineError::Foundation(FoundationError::UrlParse(
                "base URL cannot be a base".to_string(),
            ))
        })?;
        for segment in segments {
            path.push(segment);
        }
    }
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Adapter over a hosted genealogy-tree API, exposing `tree_traversal` and
/// `person_search` capabilities (§3 SourceDescriptor). Requires a bearer
/// credential, unlike the open civil index.
pub struct TreeApiAdapter {
    name: String,
    base_url: String,
    client: HttpClient,
    capabilities: Capabilities,
    rate_limiter: RateLimiter,
    retry_policy: RetryPolicy,
}

impl TreeApiAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        auth_token: &str,
        rate_limit_per_sec: f64,
        retry_budget: u32,
    ) -> ancestry_foundation::Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("ancestry-sources/0.1")?
            .bearer_auth(auth_token)?
            .build()?;
        let mut capabilities = Capabilities::new();
        capabilities.insert(Capability::PersonSearch);
        capabilities.insert(Capability::TreeTraversal);
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
impl SourceAdapter for TreeApiAdapter {
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
                tracing::warn!(source = %self.name, error = %err, "tree API health check failed");
                false
            }
        }
    }

    async fn search_births(&self, _query: &BirthQuery) -> EngineResult<Vec<BirthEntry>> {
        Ok(Vec::new())
    }

    async fn search_marriages(&self, _query: &MarriageQuery) -> EngineResult<Vec<MarriageEntry>> {
        Ok(Vec::new())
    }

    async fn confirm_death(
        &self,
        _given: &str,
        _surname: &str,
        _year: i32,
    ) -> EngineResult<Option<DeathEntry>> {
        Ok(None)
    }

    async fn search_person(&self, query: &PersonSearchQuery) -> EngineResult<Vec<PersonCandidate>> {
        self.rate_limiter.wait().await;
        let mut pairs = vec![
            ("given", query.given.clone()),
            ("surname", query.surname.clone()),
        ];
        if let Some(birth_date) = &query.birth_date {
            pairs.push(("birth_date", birth_date.clone()));
        }
        if let Some(birth_place) = &query.birth_place {
            pairs.push(("birth_place", birth_place.clone()));
        }
        if let Some(father_surname) = &query.father_surname {
            pairs.push(("father_surname", father_surname.clone()));
        }
        if let Some(mother_surname) = &query.mother_surname {
            pairs.push(("mother_surname", mother_surname.clone()));
        }
        if let Some(mother_given_name) = &query.mother_given_name {
            pairs.push(("mother_given_name", mother_given_name.clone()));
        }
        if query.count > 0 {
            pairs.push(("count", query.count.to_string()));
        }
        let url = build_url(&self.base_url, &["people", "search"], &pairs)?;

        let candidates = with_backoff(
            self.retry_policy,
            || async { self.client.download_json::<Vec<PersonCandidate>>(url.as_str()).await },
            is_transient,
        )
        .await?;
        Ok(candidates)
    }

    async fn get_parents(&self, person_id: &str) -> EngineResult<ParentLinks> {
        self.rate_limiter.wait().await;
        let url = build_url(&self.base_url, &["people", person_id, "parents"], &[])?;

        let links = with_backoff(
            self.retry_policy,
            || async { self.client.download_json::<ParentLinks>(url.as_str()).await },
            is_transient,
        )
        .await?;
        Ok(links)
    }

    async fn extract_facts(&self, person_id: &str) -> EngineResult<FactSet> {
        self.rate_limiter.wait().await;
        let url = build_url(&self.base_url, &["people", person_id, "facts"], &[])?;

        let facts = with_backoff(
            self.retry_policy,
            || async { self.client.download_json::<FactSet>(url.as_str()).await },
            is_transient,
        )
        .await?;
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_path_segments() {
        let url = build_url(
            "https://tree.example/api",
            &["people", "p123", "parents"],
            &[],
        )
        .unwrap();
        assert_eq!(url.path(), "/api/people/p123/parents");
    }

    #[test]
    fn new_adapter_exposes_expected_capabilities() {
        let adapter = TreeApiAdapter::new(
            "familytree",
            "https://tree.example/api",
            "token-123",
            1.0,
            3,
        )
        .expect("client builds");
        assert!(adapter.has_capability(Capability::PersonSearch));
        assert!(adapter.has_capability(Capability::TreeTraversal));
        assert!(!adapter.has_capability(Capability::SearchPrimary));
    }
}
