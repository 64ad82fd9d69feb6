//! Core data model: ascendancy numbering, research jobs, ancestors,
//! hypotheses and evidence records.
//!
//! See spec §3 (Data Model). The ascendancy tree is addressed by a single
//! positive integer per slot: `A = 1` is the subject, `2A` is the father of
//! `A`, `2A + 1` is the mother of `A`. [`AscNumber`] bakes that arithmetic in
//! so invariants P1/P2 hold by construction rather than by convention.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A positional index in the binary ascendancy tree. `1` is the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AscNumber(pub u32);

impl AscNumber {
    pub const SUBJECT: AscNumber = AscNumber(1);

    pub fn new(value: u32) -> Self {
        debug_assert!(value >= 1, "ascendancy numbers start at 1");
        AscNumber(value)
    }

    /// The father's slot: `2A`.
    pub fn father(self) -> AscNumber {
        AscNumber(self.0 * 2)
    }

    /// The mother's slot: `2A + 1`.
    pub fn mother(self) -> AscNumber {
        AscNumber(self.0 * 2 + 1)
    }

    /// `⌊log₂ A⌋` (P2). Generation 0 is the subject.
    pub fn generation(self) -> u32 {
        31 - self.0.leading_zeros()
    }

    /// Gender implied by parity, for `A > 1` (P1/I2). `A == 1`'s gender is
    /// supplied by the caller, not derived, so this returns `None` for it.
    pub fn implied_gender(self) -> Option<Gender> {
        if self.0 <= 1 {
            None
        } else if self.0 % 2 == 0 {
            Some(Gender::Male)
        } else {
            Some(Gender::Female)
        }
    }

    /// Is `candidate` a descendant of `self` in the ascendancy tree, i.e. is
    /// `candidate == self * 2^k + r` for some `k >= 0` and `0 <= r < 2^k`?
    /// This is the relation `deleteDescendantAncestors` (P7) must respect.
    pub fn is_descendant_of(self, candidate: AscNumber) -> bool {
        if candidate.0 < self.0 {
            return false;
        }
        let mut x = candidate.0;
        while x > self.0 {
            x /= 2;
        }
        x == self.0
    }
}

impl std::fmt::Display for AscNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Female
    }
}

/// A structured, locale-agnostic date as produced by [`crate::normalize::date`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl NormalizedDate {
    pub fn year_only(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// Render the year-only form external record sources require (§4.1).
    pub fn year_string(&self) -> String {
        self.year.to_string()
    }
}

/// Subject-provided identifying data (§6.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectInput {
    pub given_name: String,
    pub surname: String,
    /// The subject's own gender (`A = 1` is never derived by parity — §4.9
    /// Phase 0, §3 "except A=1").
    pub gender: Gender,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub death_place: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub notes: Option<String>,
}

/// A request to the engine to research a subject's ancestry (§6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    /// Number of generations to research, G ∈ [1, 7].
    pub generations: u8,
    pub subject: SubjectInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub message: String,
    pub current: u32,
    pub total: u32,
}

/// Terminal per-level ancestor counts, computed once a job finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub customer_data: u32,
    pub verified: u32,
    pub probable: u32,
    pub possible: u32,
    pub flagged: u32,
    pub not_found: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchJob {
    pub job_id: String,
    pub subject: SubjectInput,
    pub generations: u8,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub error_message: Option<String>,
    pub terminal_summary: Option<TerminalSummary>,
}

impl ResearchJob {
    pub fn new(request: JobRequest) -> Self {
        Self {
            job_id: request.job_id,
            subject: request.subject,
            generations: request.generations,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            error_message: None,
            terminal_summary: None,
        }
    }
}

/// Confidence level assigned to an ancestor (§3, §4.8). Declaration order is
/// the trust order: `CustomerData` outranks everything, `NotFound` outranks
/// nothing. Invariant I1 is a single `>=` comparison against this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    NotFound,
    Flagged,
    Possible,
    Probable,
    Verified,
    CustomerData,
}

impl ConfidenceLevel {
    /// Map a numeric confidence score [0, 100] to a level, per §4.8.
    /// This never produces `CustomerData` — that level is only ever set by
    /// anchor pre-population (§4.9 Phase 0), never derived from a score.
    pub fn from_score(score: u8) -> ConfidenceLevel {
        match score {
            90..=100 => ConfidenceLevel::Verified,
            75..=89 => ConfidenceLevel::Probable,
            50..=74 => ConfidenceLevel::Possible,
            25..=49 => ConfidenceLevel::Flagged,
            _ => ConfidenceLevel::NotFound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Birth,
    Marriage,
    Death,
    Census,
    SiblingBirth,
    TreeLead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceAspect {
    Identity,
    Parents,
    Location,
    Couple,
}

/// One item in an ancestor's evidence chain (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub kind: EvidenceKind,
    pub source_name: String,
    /// True iff this is from a primary civil/parish index rather than a
    /// derived tree lead — intrinsic to the source kind, never the outcome.
    pub independent: bool,
    pub year: Option<i32>,
    pub quarter: Option<u8>,
    pub district: Option<String>,
    pub volume: Option<String>,
    pub page: Option<String>,
    pub place: Option<String>,
    pub details: String,
    pub supports: Vec<EvidenceAspect>,
    pub weight: u32,
}

impl EvidenceRecord {
    pub fn supports(&self, aspect: EvidenceAspect) -> bool {
        self.supports.contains(&aspect)
    }
}

/// An occupant of one slot in the ascendancy tree (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ancestor {
    pub id: String,
    pub job_id: String,
    pub asc_number: AscNumber,
    pub display_name: String,
    pub gender: Gender,
    pub birth_date: Option<NormalizedDate>,
    pub death_date: Option<NormalizedDate>,
    pub birth_place: Option<String>,
    pub death_place: Option<String>,
    pub confidence_level: ConfidenceLevel,
    pub confidence_score: u8,
    pub evidence_chain: Vec<EvidenceRecord>,
    /// Append-only diagnostic trace; never truncated or rewritten.
    pub search_log: Vec<String>,
    pub sources: Vec<String>,
    pub verification_notes: Option<String>,
    pub external_person_id: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub mother_maiden_surname: Option<String>,
}

impl Ancestor {
    pub fn log(&mut self, line: impl Into<String>) {
        self.search_log.push(line.into());
    }

    pub fn add_evidence(&mut self, record: EvidenceRecord) {
        if !self.sources.contains(&record.source_name) {
            self.sources.push(record.source_name.clone());
        }
        self.evidence_chain.push(record);
    }

    /// Invariant I1: would writing `level`/`name` over this row violate
    /// customer-data protection?
    pub fn protects_against(&self, incoming_level: ConfidenceLevel) -> bool {
        self.confidence_level == ConfidenceLevel::CustomerData
            && incoming_level < ConfidenceLevel::CustomerData
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    Hypothesis,
    Primary,
    Alternate,
    Discarded,
}

/// Tree-source facts attached to a hypothesis once a household candidate is
/// resolved (§4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreePersonAttachment {
    pub person_id: String,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub childhood_census: Option<(u32, String)>,
}

/// An in-memory candidate identification during processing of one target `A`
/// (§3). Lives only for the duration of Steps 1–5; either finalized into an
/// [`Ancestor`] via the confidence scorer or discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub surname: String,
    pub forenames: String,
    pub birth_year: Option<i32>,
    pub quarter: Option<u8>,
    pub district: Option<String>,
    pub volume: Option<String>,
    pub page: Option<String>,
    pub mother_maiden_surname: Option<String>,
    pub score: i32,
    pub status: HypothesisStatus,
    pub tree_person: Option<TreePersonAttachment>,
    pub evidence_prefix: Vec<EvidenceRecord>,
}

impl Hypothesis {
    pub fn new(surname: impl Into<String>, forenames: impl Into<String>) -> Self {
        Self {
            surname: surname.into(),
            forenames: forenames.into(),
            birth_year: None,
            quarter: None,
            district: None,
            volume: None,
            page: None,
            mother_maiden_surname: None,
            score: 0,
            status: HypothesisStatus::Hypothesis,
            tree_person: None,
            evidence_prefix: Vec::new(),
        }
    }

    /// Dedup key for Step 1 ("dedup by (volume, page) when both present").
    pub fn dedup_key(&self) -> Option<(String, String)> {
        match (&self.volume, &self.page) {
            (Some(v), Some(p)) => Some((v.clone(), p.clone())),
            _ => None,
        }
    }
}

/// Anchor facts extracted from free-text notes for A ∈ {2..7} (§4.3, §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorFacts {
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
}

pub type NotesAnchorMap = BTreeMap<u32, AnchorFacts>;

/// Lightweight per-job progress view (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestorSummary {
    pub id: String,
    pub asc_number: u32,
    pub generation: u32,
    pub name: String,
    pub gender: Gender,
    pub birth_date: Option<NormalizedDate>,
    pub birth_place: Option<String>,
    pub death_date: Option<NormalizedDate>,
    pub death_place: Option<String>,
    pub external_person_id: Option<String>,
    pub confidence_score: u8,
    pub confidence_level: ConfidenceLevel,
}

impl From<&Ancestor> for AncestorSummary {
    fn from(a: &Ancestor) -> Self {
        Self {
            id: a.id.clone(),
            asc_number: a.asc_number.0,
            generation: a.asc_number.generation(),
            name: a.display_name.clone(),
            gender: a.gender,
            birth_date: a.birth_date,
            birth_place: a.birth_place.clone(),
            death_date: a.death_date,
            death_place: a.death_place.clone(),
            external_person_id: a.external_person_id.clone(),
            confidence_score: a.confidence_score,
            confidence_level: a.confidence_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressView {
    pub status: JobStatus,
    pub progress_message: String,
    pub progress_current: u32,
    pub progress_total: u32,
    pub generations: u8,
    pub ancestors: Vec<AncestorSummary>,
}

/// Total slot count for `G` generations: `2^(G+1) - 1`.
pub fn total_slots(generations: u8) -> u32 {
    (1u32 << (generations as u32 + 1)) - 1
}
