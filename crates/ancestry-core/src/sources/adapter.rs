//! The per-source adapter contract (§4.2, §6.4). Every external record
//! source — civil/parish index, genealogy-tree API, or a test fixture —
//! implements [`SourceAdapter`] with a uniform result shape. Implementations
//! must never throw across this boundary for an absence of results: "no
//! matches" is `Ok(vec![])`/`Ok(None)`, never an `Err`. Only non-recoverable
//! configuration faults (missing credentials, malformed base URL) are `Err`.

use crate::error::EngineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A capability a source may offer (§3 SourceDescriptor, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Primary civil/parish index search (births, marriages).
    SearchPrimary,
    /// Death confirmation against a primary index.
    Confirmation,
    /// Genealogy-tree traversal (parent lookups, fact extraction).
    TreeTraversal,
    /// Person search against a genealogy tree.
    PersonSearch,
}

pub type Capabilities = HashSet<Capability>;

/// Parameters for a birth-index search (§4.2 `searchBirths`).
#[derive(Debug, Clone)]
pub struct BirthQuery {
    pub surname: String,
    pub given: String,
    pub year_from: i32,
    pub year_to: i32,
    pub district: Option<String>,
}

/// Parameters for a marriage-index search (§4.2 `searchMarriages`).
#[derive(Debug, Clone)]
pub struct MarriageQuery {
    pub surname: String,
    pub given: Option<String>,
    pub year_from: i32,
    pub year_to: i32,
    pub district: Option<String>,
}

/// One civil-index birth-registration hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirthEntry {
    pub surname: String,
    pub given: String,
    pub year: i32,
    pub quarter: Option<u8>,
    pub district: Option<String>,
    pub volume: Option<String>,
    pub page: Option<String>,
    pub mother_maiden_surname: Option<String>,
}

/// One civil-index marriage-registration hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarriageEntry {
    pub groom_surname: String,
    pub groom_given: Option<String>,
    pub bride_surname: String,
    pub bride_given: Option<String>,
    pub year: i32,
    pub quarter: Option<u8>,
    pub district: Option<String>,
    pub volume: Option<String>,
    pub page: Option<String>,
}

/// A death-registration confirmation (§4.2 `confirmDeath`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathEntry {
    pub given: String,
    pub surname: String,
    pub year: i32,
    pub district: Option<String>,
}

/// Query parameters for a tree-source person search (§4.2 `searchPerson`).
#[derive(Debug, Clone, Default)]
pub struct PersonSearchQuery {
    pub given: String,
    pub surname: String,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub father_surname: Option<String>,
    pub mother_surname: Option<String>,
    pub mother_given_name: Option<String>,
    pub count: u32,
}

/// One tree-source person-search result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonCandidate {
    pub person_id: String,
    pub given: String,
    pub surname: String,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
}

/// The result of `getParents`: the tree's recorded parent links, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentLinks {
    pub father: Option<PersonCandidate>,
    pub mother: Option<PersonCandidate>,
}

/// A single census appearance extracted from tree facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensusFact {
    pub year: u32,
    pub place: String,
    pub age: Option<u32>,
}

/// The fact bundle `extractFactsByType` returns for a tree person. Only
/// census facts are specified by name in §4.2; other fact types pass
/// through as opaque key/value groups for forward compatibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactSet {
    pub census: Vec<CensusFact>,
}

/// The uniform per-source adapter contract (§4.2, §6.4).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier, used as `EvidenceRecord::source_name`.
    fn name(&self) -> &str;

    /// The capability set this source exposes (independent of whether it is
    /// currently reachable — see [`SourceAdapter::is_available`]).
    fn capabilities(&self) -> &Capabilities;

    fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities().contains(&cap)
    }

    /// Whether this source is presently reachable. Distinct from
    /// "configured": a configured-but-down source reports `false` here.
    async fn is_available(&self) -> bool;

    async fn search_births(&self, query: &BirthQuery) -> EngineResult<Vec<BirthEntry>>;

    async fn search_marriages(&self, query: &MarriageQuery) -> EngineResult<Vec<MarriageEntry>>;

    async fn confirm_death(
        &self,
        given: &str,
        surname: &str,
        year: i32,
    ) -> EngineResult<Option<DeathEntry>>;

    async fn search_person(&self, query: &PersonSearchQuery) -> EngineResult<Vec<PersonCandidate>>;

    async fn get_parents(&self, person_id: &str) -> EngineResult<ParentLinks>;

    async fn extract_facts(&self, person_id: &str) -> EngineResult<FactSet>;
}
