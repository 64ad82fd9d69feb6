//! A deterministic, fixture-backed [`SourceAdapter`] used by unit and
//! integration tests so the full C5→C9 pipeline can be exercised without
//! network access.

use super::adapter::*;
use crate::error::EngineResult;
use async_trait::async_trait;
use std::sync::RwLock;

#[derive(Default, Clone)]
pub struct MockFixtures {
    pub births: Vec<BirthEntry>,
    pub marriages: Vec<MarriageEntry>,
    pub deaths: Vec<DeathEntry>,
    pub persons: Vec<PersonCandidate>,
    pub parents: Vec<(String, ParentLinks)>,
    pub facts: Vec<(String, FactSet)>,
}

/// A named, capability-tagged mock source backed by in-memory fixtures.
/// Queries do naive substring/range filtering over the fixture tables, which
/// is enough to drive deterministic test scenarios.
pub struct MockAdapter {
    name: String,
    capabilities: Capabilities,
    fixtures: MockFixtures,
    available: RwLock<bool>,
}

pub struct MockAdapterBuilder {
    name: String,
    capabilities: Capabilities,
    fixtures: MockFixtures,
    available: bool,
}

impl MockAdapterBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Capabilities::new(),
            fixtures: MockFixtures::default(),
            available: true,
        }
    }

    pub fn with_capability(mut self, cap: Capability) -> Self {
        self.capabilities.insert(cap);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_births(mut self, entries: Vec<BirthEntry>) -> Self {
        self.fixtures.births = entries;
        self
    }

    pub fn with_marriages(mut self, entries: Vec<MarriageEntry>) -> Self {
        self.fixtures.marriages = entries;
        self
    }

    pub fn with_deaths(mut self, entries: Vec<DeathEntry>) -> Self {
        self.fixtures.deaths = entries;
        self
    }

    pub fn with_persons(mut self, entries: Vec<PersonCandidate>) -> Self {
        self.fixtures.persons = entries;
        self
    }

    pub fn with_parents(mut self, person_id: impl Into<String>, links: ParentLinks) -> Self {
        self.fixtures.parents.push((person_id.into(), links));
        self
    }

    pub fn with_facts(mut self, person_id: impl Into<String>, facts: FactSet) -> Self {
        self.fixtures.facts.push((person_id.into(), facts));
        self
    }

    pub fn build(self) -> MockAdapter {
        MockAdapter {
            name: self.name,
            capabilities: self.capabilities,
            fixtures: self.fixtures,
            available: RwLock::new(self.available),
        }
    }
}

impl MockAdapter {
    pub fn set_available(&self, available: bool) {
        *self.available.write().unwrap() = available;
    }
}

fn surname_matches(candidate: &str, wanted: &str) -> bool {
    candidate.eq_ignore_ascii_case(wanted)
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn is_available(&self) -> bool {
        *self.available.read().unwrap()
    }

    async fn search_births(&self, query: &BirthQuery) -> EngineResult<Vec<BirthEntry>> {
        Ok(self
            .fixtures
            .births
            .iter()
            .filter(|b| {
                surname_matches(&b.surname, &query.surname)
                    && b.year >= query.year_from
                    && b.year <= query.year_to
                    && query
                        .district
                        .as_ref()
                        .map(|d| b.district.as_deref() == Some(d.as_str()))
                        .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn search_marriages(&self, query: &MarriageQuery) -> EngineResult<Vec<MarriageEntry>> {
        Ok(self
            .fixtures
            .marriages
            .iter()
            .filter(|m| {
                let surname_hit = surname_matches(&m.groom_surname, &query.surname)
                    || surname_matches(&m.bride_surname, &query.surname);
                surname_hit
                    && m.year >= query.year_from
                    && m.year <= query.year_to
                    && query
                        .district
                        .as_ref()
                        .map(|d| m.district.as_deref() == Some(d.as_str()))
                        .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn confirm_death(
        &self,
        given: &str,
        surname: &str,
        year: i32,
    ) -> EngineResult<Option<DeathEntry>> {
        Ok(self
            .fixtures
            .deaths
            .iter()
            .find(|d| {
                surname_matches(&d.surname, surname)
                    && surname_matches(&d.given, given)
                    && d.year == year
            })
            .cloned())
    }

    async fn search_person(&self, query: &PersonSearchQuery) -> EngineResult<Vec<PersonCandidate>> {
        let mut results: Vec<PersonCandidate> = self
            .fixtures
            .persons
            .iter()
            .filter(|p| surname_matches(&p.surname, &query.surname))
            .cloned()
            .collect();
        if query.count > 0 {
            results.truncate(query.count as usize);
        }
        Ok(results)
    }

    async fn get_parents(&self, person_id: &str) -> EngineResult<ParentLinks> {
        Ok(self
            .fixtures
            .parents
            .iter()
            .find(|(id, _)| id == person_id)
            .map(|(_, links)| links.clone())
            .unwrap_or_default())
    }

    async fn extract_facts(&self, person_id: &str) -> EngineResult<FactSet> {
        Ok(self
            .fixtures
            .facts
            .iter()
            .find(|(id, _)| id == person_id)
            .map(|(_, facts)| facts.clone())
            .unwrap_or_default())
    }
}
