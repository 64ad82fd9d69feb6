//! Repository Contract (C11, §6.2): a typed, atomic-per-row facade over
//! persistence. The engine treats the concrete store as a black box — this
//! module defines only the trait and an in-memory reference implementation
//! used by tests and the CLI demo (§1 "out of scope": the relational
//! storage engine itself).

use crate::model::{
    Ancestor, AncestorSummary, AscNumber, ConfidenceLevel, JobProgress, JobProgressView,
    JobRequest, JobStatus, ResearchJob, TerminalSummary,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error("ancestor job={job_id} asc_number={asc_number} not found")]
    AncestorNotFound { job_id: String, asc_number: u32 },
    #[error("persistence failure: {0}")]
    Backend(String),
}

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// One inspection candidate persisted alongside a target's Step-1 hypothesis
/// search, so an operator can review the full ranked list (§4.4: "persist
/// top 15 to the repository as inspection candidates").
#[derive(Debug, Clone)]
pub struct SearchCandidateRow {
    pub job_id: String,
    pub asc_number: AscNumber,
    pub surname: String,
    pub forenames: String,
    pub birth_year: Option<i32>,
    pub district: Option<String>,
    pub volume: Option<String>,
    pub page: Option<String>,
    pub score: i32,
}

/// A partial update to a [`ResearchJob`] (§6.2 `updateResearchJob`).
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<JobProgress>,
    pub terminal_summary: Option<TerminalSummary>,
    pub error_message: Option<Option<String>>,
}

/// A partial update to an [`Ancestor`] row (§6.2 `updateAncestorByAscNumber`).
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AncestorUpdate {
    pub display_name: Option<String>,
    pub birth_date: Option<Option<crate::model::NormalizedDate>>,
    pub death_date: Option<Option<crate::model::NormalizedDate>>,
    pub birth_place: Option<Option<String>>,
    pub death_place: Option<Option<String>>,
    pub confidence_level: Option<ConfidenceLevel>,
    pub confidence_score: Option<u8>,
    pub append_evidence: Vec<crate::model::EvidenceRecord>,
    pub append_log: Vec<String>,
    pub external_person_id: Option<Option<String>>,
    pub father_name: Option<Option<String>>,
    pub mother_name: Option<Option<String>>,
    pub mother_maiden_surname: Option<Option<String>>,
    pub verification_notes: Option<Option<String>>,
}

/// The repository contract the engine is built against (§6.2). All
/// operations are atomic per row; the engine never depends on a concrete
/// store.
#[async_trait]
pub trait ResearchRepository: Send + Sync {
    async fn create_research_job(&self, request: JobRequest) -> RepoResult<()>;
    async fn update_research_job(&self, job_id: &str, partial: JobUpdate) -> RepoResult<()>;
    async fn update_job_progress(
        &self,
        job_id: &str,
        message: &str,
        current: u32,
        total: u32,
    ) -> RepoResult<()>;
    async fn get_job(&self, job_id: &str) -> RepoResult<Option<ResearchJob>>;

    async fn get_ancestor_by_asc_number(
        &self,
        job_id: &str,
        a: AscNumber,
    ) -> RepoResult<Option<Ancestor>>;
    async fn get_ancestors(&self, job_id: &str) -> RepoResult<Vec<Ancestor>>;
    async fn get_ancestor_by_id(&self, id: &str) -> RepoResult<Option<Ancestor>>;
    async fn add_ancestor(&self, row: Ancestor) -> RepoResult<()>;
    async fn update_ancestor_by_asc_number(
        &self,
        job_id: &str,
        a: AscNumber,
        partial: AncestorUpdate,
    ) -> RepoResult<()>;
    /// Deletes `A` and all of its descendants (P7); returns the deleted ids.
    async fn delete_descendant_ancestors(&self, job_id: &str, a: AscNumber) -> RepoResult<Vec<String>>;

    async fn add_search_candidate(&self, row: SearchCandidateRow) -> RepoResult<()>;
    async fn delete_search_candidates(&self, job_id: &str) -> RepoResult<()>;
    async fn get_search_candidates(
        &self,
        job_id: &str,
        a: AscNumber,
    ) -> RepoResult<Vec<SearchCandidateRow>>;

    async fn get_rejected_fs_ids(&self, job_id: &str) -> RepoResult<HashSet<String>>;

    async fn get_setting(&self, key: &str) -> RepoResult<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> RepoResult<()>;

    /// §6.3 progress-polling shape, derived from `get_job` + `get_ancestors`.
    async fn get_job_progress_view(&self, job_id: &str) -> RepoResult<Option<JobProgressView>> {
        let Some(job) = self.get_job(job_id).await? else {
            return Ok(None);
        };
        let ancestors = self.get_ancestors(job_id).await?;
        Ok(Some(JobProgressView {
            status: job.status,
            progress_message: job.progress.message,
            progress_current: job.progress.current,
            progress_total: job.progress.total,
            generations: job.generations,
            ancestors: ancestors.iter().map(AncestorSummary::from).collect(),
        }))
    }

    /// Invariant-I1-respecting write: if an existing row at `A` carries
    /// `ConfidenceLevel::CustomerData`, the incoming row must not overwrite
    /// its level or name — only evidence/log/external-id append through.
    /// Detects a would-be breach before writing and no-ops it (§7).
    async fn write_ancestor_respecting_protection(&self, incoming: Ancestor) -> RepoResult<()> {
        match self
            .get_ancestor_by_asc_number(&incoming.job_id, incoming.asc_number)
            .await?
        {
            None => self.add_ancestor(incoming).await,
            Some(existing) if existing.protects_against(incoming.confidence_level) => {
                tracing::warn!(
                    job_id = %incoming.job_id,
                    asc_number = incoming.asc_number.0,
                    "refusing to lower a Customer Data ancestor (I1)"
                );
                let mut evidence_only = AncestorUpdate::default();
                evidence_only.append_evidence = incoming.evidence_chain;
                evidence_only.append_log = incoming.search_log;
                if incoming.external_person_id.is_some() {
                    evidence_only.external_person_id = Some(incoming.external_person_id);
                }
                self.update_ancestor_by_asc_number(
                    &incoming.job_id,
                    incoming.asc_number,
                    evidence_only,
                )
                .await
            }
            Some(_) => {
                let mut update = AncestorUpdate {
                    display_name: Some(incoming.display_name),
                    birth_date: Some(incoming.birth_date),
                    death_date: Some(incoming.death_date),
                    birth_place: Some(incoming.birth_place),
                    death_place: Some(incoming.death_place),
                    confidence_level: Some(incoming.confidence_level),
                    confidence_score: Some(incoming.confidence_score),
                    append_evidence: incoming.evidence_chain,
                    append_log: incoming.search_log,
                    external_person_id: Some(incoming.external_person_id),
                    father_name: Some(incoming.father_name),
                    mother_name: Some(incoming.mother_name),
                    mother_maiden_surname: Some(incoming.mother_maiden_surname),
                    verification_notes: Some(incoming.verification_notes),
                };
                // sources list is recomputed by add_evidence as each record is
                // appended, so nothing extra to set here.
                update.append_log.push(format!(
                    "updated via pipeline at score {}",
                    incoming.confidence_score
                ));
                self.update_ancestor_by_asc_number(&incoming.job_id, incoming.asc_number, update)
                    .await
            }
        }
    }
}

/// Reference in-memory implementation used by tests and the CLI demo.
#[derive(Default)]
pub struct InMemoryRepository {
    jobs: RwLock<HashMap<String, ResearchJob>>,
    ancestors: RwLock<HashMap<String, HashMap<u32, Ancestor>>>,
    candidates: RwLock<HashMap<String, Vec<SearchCandidateRow>>>,
    rejected_fs_ids: RwLock<HashMap<String, HashSet<String>>>,
    settings: RwLock<HashMap<String, String>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/demo seam: pre-load rejected fs ids for a job (§6.2, loaded
    /// read-only at engine construction per §5).
    pub fn seed_rejected_fs_ids(&self, job_id: &str, ids: HashSet<String>) {
        self.rejected_fs_ids
            .write()
            .unwrap()
            .insert(job_id.to_string(), ids);
    }
}

fn apply_ancestor_update(ancestor: &mut Ancestor, update: AncestorUpdate) {
    if let Some(v) = update.display_name {
        ancestor.display_name = v;
    }
    if let Some(v) = update.birth_date {
        ancestor.birth_date = v;
    }
    if let Some(v) = update.death_date {
        ancestor.death_date = v;
    }
    if let Some(v) = update.birth_place {
        ancestor.birth_place = v;
    }
    if let Some(v) = update.death_place {
        ancestor.death_place = v;
    }
    if let Some(v) = update.confidence_level {
        ancestor.confidence_level = v;
    }
    if let Some(v) = update.confidence_score {
        ancestor.confidence_score = v;
    }
    for record in update.append_evidence {
        ancestor.add_evidence(record);
    }
    for line in update.append_log {
        ancestor.log(line);
    }
    if let Some(v) = update.external_person_id {
        ancestor.external_person_id = v;
    }
    if let Some(v) = update.father_name {
        ancestor.father_name = v;
    }
    if let Some(v) = update.mother_name {
        ancestor.mother_name = v;
    }
    if let Some(v) = update.mother_maiden_surname {
        ancestor.mother_maiden_surname = v;
    }
    if let Some(v) = update.verification_notes {
        ancestor.verification_notes = v;
    }
}

#[async_trait]
impl ResearchRepository for InMemoryRepository {
    async fn create_research_job(&self, request: JobRequest) -> RepoResult<()> {
        let job = ResearchJob::new(request);
        self.jobs.write().unwrap().insert(job.job_id.clone(), job);
        Ok(())
    }

    async fn update_research_job(&self, job_id: &str, partial: JobUpdate) -> RepoResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| RepositoryError::JobNotFound(job_id.to_string()))?;
        if let Some(status) = partial.status {
            job.status = status;
        }
        if let Some(progress) = partial.progress {
            job.progress = progress;
        }
        if let Some(summary) = partial.terminal_summary {
            job.terminal_summary = Some(summary);
        }
        if let Some(message) = partial.error_message {
            job.error_message = message;
        }
        Ok(())
    }

    async fn update_job_progress(
        &self,
        job_id: &str,
        message: &str,
        current: u32,
        total: u32,
    ) -> RepoResult<()> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| RepositoryError::JobNotFound(job_id.to_string()))?;
        job.progress = JobProgress {
            message: message.to_string(),
            current,
            total,
        };
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> RepoResult<Option<ResearchJob>> {
        Ok(self.jobs.read().unwrap().get(job_id).cloned())
    }

    async fn get_ancestor_by_asc_number(
        &self,
        job_id: &str,
        a: AscNumber,
    ) -> RepoResult<Option<Ancestor>> {
        Ok(self
            .ancestors
            .read()
            .unwrap()
            .get(job_id)
            .and_then(|m| m.get(&a.0))
            .cloned())
    }

    async fn get_ancestors(&self, job_id: &str) -> RepoResult<Vec<Ancestor>> {
        let mut rows: Vec<Ancestor> = self
            .ancestors
            .read()
            .unwrap()
            .get(job_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|a| a.asc_number.0);
        Ok(rows)
    }

    async fn get_ancestor_by_id(&self, id: &str) -> RepoResult<Option<Ancestor>> {
        Ok(self
            .ancestors
            .read()
            .unwrap()
            .values()
            .flat_map(|m| m.values())
            .find(|a| a.id == id)
            .cloned())
    }

    async fn add_ancestor(&self, row: Ancestor) -> RepoResult<()> {
        self.ancestors
            .write()
            .unwrap()
            .entry(row.job_id.clone())
            .or_default()
            .insert(row.asc_number.0, row);
        Ok(())
    }

    async fn update_ancestor_by_asc_number(
        &self,
        job_id: &str,
        a: AscNumber,
        partial: AncestorUpdate,
    ) -> RepoResult<()> {
        let mut ancestors = self.ancestors.write().unwrap();
        let row = ancestors
            .get_mut(job_id)
            .and_then(|m| m.get_mut(&a.0))
            .ok_or_else(|| RepositoryError::AncestorNotFound {
                job_id: job_id.to_string(),
                asc_number: a.0,
            })?;
        apply_ancestor_update(row, partial);
        Ok(())
    }

    async fn delete_descendant_ancestors(&self, job_id: &str, a: AscNumber) -> RepoResult<Vec<String>> {
        let mut ancestors = self.ancestors.write().unwrap();
        let Some(job_map) = ancestors.get_mut(job_id) else {
            return Ok(Vec::new());
        };
        let to_delete: Vec<u32> = job_map
            .keys()
            .copied()
            .filter(|&candidate| a.is_descendant_of(AscNumber(candidate)))
            .collect();
        let mut deleted_ids = Vec::new();
        for asc in to_delete {
            if let Some(row) = job_map.remove(&asc) {
                deleted_ids.push(row.id);
            }
        }
        Ok(deleted_ids)
    }

    async fn add_search_candidate(&self, row: SearchCandidateRow) -> RepoResult<()> {
        self.candidates
            .write()
            .unwrap()
            .entry(row.job_id.clone())
            .or_default()
            .push(row);
        Ok(())
    }

    async fn delete_search_candidates(&self, job_id: &str) -> RepoResult<()> {
        self.candidates.write().unwrap().remove(job_id);
        Ok(())
    }

    async fn get_search_candidates(
        &self,
        job_id: &str,
        a: AscNumber,
    ) -> RepoResult<Vec<SearchCandidateRow>> {
        Ok(self
            .candidates
            .read()
            .unwrap()
            .get(job_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.asc_number == a)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_rejected_fs_ids(&self, job_id: &str) -> RepoResult<HashSet<String>> {
        Ok(self
            .rejected_fs_ids
            .read()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_setting(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.settings.read().unwrap().get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> RepoResult<()> {
        self.settings
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvidenceKind, EvidenceRecord, Gender, SubjectInput};

    fn sample_ancestor(job_id: &str, asc: u32, level: ConfidenceLevel) -> Ancestor {
        Ancestor {
            id: format!("{job_id}-{asc}"),
            job_id: job_id.to_string(),
            asc_number: AscNumber(asc),
            display_name: "Jane Smith".into(),
            gender: Gender::Female,
            birth_date: None,
            death_date: None,
            birth_place: None,
            death_place: None,
            confidence_level: level,
            confidence_score: if level == ConfidenceLevel::CustomerData {
                100
            } else {
                60
            },
            evidence_chain: Vec::new(),
            search_log: Vec::new(),
            sources: Vec::new(),
            verification_notes: None,
            external_person_id: None,
            father_name: None,
            mother_name: None,
            mother_maiden_surname: None,
        }
    }

    #[tokio::test]
    async fn delete_descendants_matches_p7() {
        let repo = InMemoryRepository::new();
        for asc in [2u32, 4, 5, 8, 9, 10, 11, 3, 6, 7] {
            repo.add_ancestor(sample_ancestor("job1", asc, ConfidenceLevel::Possible))
                .await
                .unwrap();
        }
        let deleted = repo
            .delete_descendant_ancestors("job1", AscNumber(2))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 7); // 2, 4, 5, 8, 9, 10, 11
        let remaining = repo.get_ancestors("job1").await.unwrap();
        let remaining_asc: Vec<u32> = remaining.iter().map(|a| a.asc_number.0).collect();
        assert!(remaining_asc.contains(&3));
        assert!(remaining_asc.contains(&6));
        assert!(remaining_asc.contains(&7));
        assert!(!remaining_asc.contains(&2));
        assert!(!remaining_asc.contains(&11));
    }

    #[tokio::test]
    async fn protection_blocks_name_and_level_but_allows_evidence() {
        let repo = InMemoryRepository::new();
        repo.add_ancestor(sample_ancestor("job1", 2, ConfidenceLevel::CustomerData))
            .await
            .unwrap();

        let mut incoming = sample_ancestor("job1", 2, ConfidenceLevel::Probable);
        incoming.display_name = "Someone Else".into();
        incoming.external_person_id = Some("fs123".into());
        incoming.evidence_chain.push(EvidenceRecord {
            kind: EvidenceKind::Birth,
            source_name: "civil-index".into(),
            independent: true,
            year: Some(1920),
            quarter: None,
            district: None,
            volume: None,
            page: None,
            place: None,
            details: "match".into(),
            supports: vec![],
            weight: 25,
        });

        repo.write_ancestor_respecting_protection(incoming)
            .await
            .unwrap();

        let stored = repo
            .get_ancestor_by_asc_number("job1", AscNumber(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.display_name, "Jane Smith");
        assert_eq!(stored.confidence_level, ConfidenceLevel::CustomerData);
        assert_eq!(stored.confidence_score, 100);
        assert_eq!(stored.external_person_id.as_deref(), Some("fs123"));
        assert_eq!(stored.evidence_chain.len(), 1);
    }

    #[tokio::test]
    async fn job_progress_view_reflects_job_and_ancestors() {
        let repo = InMemoryRepository::new();
        repo.create_research_job(JobRequest {
            job_id: "job1".into(),
            generations: 2,
            subject: SubjectInput::default(),
        })
        .await
        .unwrap();
        repo.add_ancestor(sample_ancestor("job1", 1, ConfidenceLevel::CustomerData))
            .await
            .unwrap();

        let view = repo.get_job_progress_view("job1").await.unwrap().unwrap();
        assert_eq!(view.ancestors.len(), 1);
        assert_eq!(view.generations, 2);
    }
}
