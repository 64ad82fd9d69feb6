//! Hypothesis Builder (C5, §4.4, Step 1): produces ranked birth-record
//! hypotheses for one target ascendant from a primary civil index.

use crate::model::{EvidenceAspect, EvidenceKind, EvidenceRecord, Hypothesis, HypothesisStatus};
use crate::normalize::{
    districts_equal, districts_similar, district_contains, names_prefix_match, names_similar,
    surname_variants,
};
use crate::sources::{BirthEntry, BirthQuery, Capability, SourceRegistry};

/// Caller-supplied identifying data for the target ascendant (§4.4 input).
#[derive(Debug, Clone, Default)]
pub struct PersonInfo {
    pub given: String,
    pub surname: String,
    pub birth_year: Option<i32>,
    pub birth_place: Option<String>,
    pub mother_maiden_surname: Option<String>,
    pub father_surname: Option<String>,
}

const YEAR_WINDOW: i32 = 5;
const MAX_SURNAME_VARIANTS_TRIED: usize = 2;
const PERSIST_TOP_N: usize = 15;
const RETURN_TOP_N: usize = 5;

fn birth_evidence(entry: &BirthEntry, source_name: &str, via_variant: bool) -> EvidenceRecord {
    EvidenceRecord {
        kind: EvidenceKind::Birth,
        source_name: source_name.to_string(),
        independent: true,
        year: Some(entry.year),
        quarter: entry.quarter,
        district: entry.district.clone(),
        volume: entry.volume.clone(),
        page: entry.page.clone(),
        place: entry.district.clone(),
        details: format!(
            "birth index: {} {} ({}{})",
            entry.given,
            entry.surname,
            entry.year,
            entry
                .quarter
                .map(|q| format!(" Q{q}"))
                .unwrap_or_default()
        ),
        supports: vec![EvidenceAspect::Identity, EvidenceAspect::Location],
        weight: if via_variant { 20 } else { 25 },
    }
}

fn district_score(candidate: Option<&str>, wanted: Option<&str>) -> i32 {
    match (candidate, wanted) {
        (Some(c), Some(w)) if districts_equal(c, w) => 15,
        (Some(c), Some(w)) if district_contains(c, w) => 10,
        (Some(c), Some(w)) if districts_similar(c, w) => 8,
        _ => 0,
    }
}

fn score_candidate(entry: &BirthEntry, info: &PersonInfo) -> i32 {
    let mut score = 0;
    if names_similar(&info.given, &entry.given) {
        score += 20;
    } else if names_prefix_match(&info.given, &entry.given) {
        score += 15;
    }

    if let Some(target_year) = info.birth_year {
        let diff = (target_year - entry.year).abs();
        score += match diff {
            0 => 20,
            1 => 15,
            2..=3 => 10,
            4..=5 => 5,
            _ => 0,
        };
    }

    score += district_score(
        entry.district.as_deref(),
        info.birth_place.as_deref().and_then(crate::normalize::district_of).as_deref(),
    );

    if let (Some(wanted), Some(found)) = (&info.mother_maiden_surname, &entry.mother_maiden_surname) {
        if wanted.eq_ignore_ascii_case(found) {
            score += 30;
        } else if found.to_lowercase().contains(&wanted.to_lowercase())
            || wanted.to_lowercase().contains(&found.to_lowercase())
        {
            score += 15;
        }
    }

    score
}

fn hypothesis_from_entry(entry: &BirthEntry, source_name: &str, via_variant: bool, score: i32) -> Hypothesis {
    let mut hyp = Hypothesis::new(entry.surname.clone(), entry.given.clone());
    hyp.birth_year = Some(entry.year);
    hyp.quarter = entry.quarter;
    hyp.district = entry.district.clone();
    hyp.volume = entry.volume.clone();
    hyp.page = entry.page.clone();
    hyp.mother_maiden_surname = entry.mother_maiden_surname.clone();
    hyp.score = score;
    hyp.status = HypothesisStatus::Hypothesis;
    hyp.evidence_prefix
        .push(birth_evidence(entry, source_name, via_variant));
    hyp
}

/// Outcome of a Step-1 run: the ranked hypotheses to pursue downstream, plus
/// the full ranked list for persistence as inspection candidates (§4.4).
pub struct HypothesisResult {
    /// Capped to [`RETURN_TOP_N`] — what Steps 2+ actually consume.
    pub hypotheses: Vec<Hypothesis>,
    /// Capped to [`PERSIST_TOP_N`] — what the orchestrator persists via
    /// `addSearchCandidate` for operator inspection.
    pub inspection_candidates: Vec<Hypothesis>,
}

/// Build ranked birth-record hypotheses for one target (§4.4, Step 1).
///
/// Requires a primary-index source with `search_primary` and a birth year;
/// returns an empty result (never an error) when either is missing, so the
/// orchestrator falls back to §4.10 degraded mode.
pub async fn build_hypotheses(info: &PersonInfo, registry: &SourceRegistry) -> HypothesisResult {
    let Some(birth_year) = info.birth_year else {
        return HypothesisResult {
            hypotheses: Vec::new(),
            inspection_candidates: Vec::new(),
        };
    };
    let Some(source) = registry
        .first_available_with_capability(Capability::SearchPrimary)
        .await
    else {
        return HypothesisResult {
            hypotheses: Vec::new(),
            inspection_candidates: Vec::new(),
        };
    };

    let district = info.birth_place.as_deref().and_then(crate::normalize::district_of);

    // Pass 1: surname + given + year window + district.
    let pass1_query = BirthQuery {
        surname: info.surname.clone(),
        given: info.given.clone(),
        year_from: birth_year - YEAR_WINDOW,
        year_to: birth_year + YEAR_WINDOW,
        district: district.clone(),
    };
    let mut results = source
        .search_births(&pass1_query)
        .await
        .unwrap_or_default();
    let mut via_variant = vec![false; results.len()];

    // Pass 2: widen by dropping district when the first pass was thin.
    if results.len() < 3 && district.is_some() {
        let pass2_query = BirthQuery {
            district: None,
            ..pass1_query.clone()
        };
        let extra = source.search_births(&pass2_query).await.unwrap_or_default();
        via_variant.extend(std::iter::repeat(false).take(extra.len()));
        results.extend(extra);
    }

    // Pass 3: probe mechanical surname variants when nothing matched at all.
    if results.is_empty() {
        for variant in surname_variants(&info.surname)
            .into_iter()
            .take(MAX_SURNAME_VARIANTS_TRIED)
        {
            let variant_query = BirthQuery {
                surname: variant,
                ..pass1_query.clone()
            };
            let extra = source
                .search_births(&variant_query)
                .await
                .unwrap_or_default();
            via_variant.extend(std::iter::repeat(true).take(extra.len()));
            results.extend(extra);
        }
    }

    let mut scored: Vec<Hypothesis> = results
        .iter()
        .zip(&via_variant)
        .map(|(entry, via_variant)| {
            let score = score_candidate(entry, info);
            hypothesis_from_entry(entry, source.name(), *via_variant, score)
        })
        .collect();

    // Dedup by (volume, page) when both present (§4.4 Step 1).
    let mut seen = std::collections::HashSet::new();
    scored.retain(|hyp| match hyp.dedup_key() {
        Some(key) => seen.insert(key),
        None => true,
    });

    scored.sort_by(|a, b| b.score.cmp(&a.score));

    let inspection_candidates: Vec<Hypothesis> = scored.iter().take(PERSIST_TOP_N).cloned().collect();
    let hypotheses: Vec<Hypothesis> = scored.into_iter().take(RETURN_TOP_N).collect();

    HypothesisResult {
        hypotheses,
        inspection_candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockAdapterBuilder;
    use std::sync::Arc;

    fn registry_with(entries: Vec<BirthEntry>) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockAdapterBuilder::new("civil-index")
                .with_capability(Capability::SearchPrimary)
                .with_births(entries)
                .build(),
        ));
        registry
    }

    fn entry(given: &str, surname: &str, year: i32, district: &str, mother_maiden: &str) -> BirthEntry {
        BirthEntry {
            surname: surname.into(),
            given: given.into(),
            year,
            quarter: Some(2),
            district: Some(district.into()),
            volume: Some("7a".into()),
            page: Some("123".into()),
            mother_maiden_surname: Some(mother_maiden.into()),
        }
    }

    #[tokio::test]
    async fn no_birth_year_yields_empty_result() {
        let registry = registry_with(vec![]);
        let info = PersonInfo {
            given: "John".into(),
            surname: "Smith".into(),
            ..Default::default()
        };
        let result = build_hypotheses(&info, &registry).await;
        assert!(result.hypotheses.is_empty());
    }

    #[tokio::test]
    async fn no_primary_source_yields_empty_result() {
        let registry = SourceRegistry::new();
        let info = PersonInfo {
            given: "John".into(),
            surname: "Smith".into(),
            birth_year: Some(1920),
            ..Default::default()
        };
        let result = build_hypotheses(&info, &registry).await;
        assert!(result.hypotheses.is_empty());
    }

    #[tokio::test]
    async fn scores_rank_best_match_first() {
        let registry = registry_with(vec![
            entry("John", "Smith", 1925, "Derby", "Brown"),
            entry("John", "Smith", 1920, "Derby", "Jones"),
        ]);
        let info = PersonInfo {
            given: "John".into(),
            surname: "Smith".into(),
            birth_year: Some(1920),
            birth_place: Some("Derby, Derbyshire".into()),
            mother_maiden_surname: Some("Jones".into()),
            father_surname: None,
        };
        let result = build_hypotheses(&info, &registry).await;
        assert_eq!(result.hypotheses[0].mother_maiden_surname.as_deref(), Some("Jones"));
        assert!(result.hypotheses[0].score > result.hypotheses[1].score);
    }

    #[tokio::test]
    async fn dedups_by_volume_and_page() {
        let mut dup = entry("John", "Smith", 1920, "Derby", "Jones");
        dup.volume = Some("7a".into());
        dup.page = Some("123".into());
        let mut dup2 = dup.clone();
        dup2.given = "Jonathan".into(); // same (volume, page) -> same registration
        let registry = registry_with(vec![dup, dup2]);
        let info = PersonInfo {
            given: "John".into(),
            surname: "Smith".into(),
            birth_year: Some(1920),
            ..Default::default()
        };
        let result = build_hypotheses(&info, &registry).await;
        assert_eq!(result.inspection_candidates.len(), 1);
    }

    #[tokio::test]
    async fn surname_variants_tried_when_no_direct_hit() {
        let registry = registry_with(vec![entry("John", "Smyth", 1920, "Derby", "Jones")]);
        let info = PersonInfo {
            given: "John".into(),
            surname: "Smythe".into(),
            birth_year: Some(1920),
            ..Default::default()
        };
        let result = build_hypotheses(&info, &registry).await;
        assert_eq!(result.hypotheses.len(), 1);
        assert_eq!(result.hypotheses[0].evidence_prefix[0].weight, 20);
    }
}
