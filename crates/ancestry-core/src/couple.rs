//! Parent-Couple Finder (C7, §4.6, Step 3): locates the parents' marriage
//! record given an enriched hypothesis.

use crate::model::{EvidenceAspect, EvidenceKind, EvidenceRecord};
use crate::normalize::{districts_equal, districts_similar, names_similar};
use crate::sources::{Capability, MarriageEntry, MarriageQuery, SourceRegistry};

const ACCEPT_THRESHOLD: i32 = 40;
const BRIDE_SEARCH_THRESHOLD: i32 = 60;

/// The inputs a marriage search needs, derived by the caller from a
/// hypothesis plus any tree facts attached to it (§4.6).
#[derive(Debug, Clone, Default)]
pub struct CoupleQuery {
    pub father_surname: String,
    pub father_given: Option<String>,
    pub mother_maiden_surname: Option<String>,
    pub mother_given: Option<String>,
    pub district: Option<String>,
    pub child_birth_year: i32,
}

/// The outcome of a Step-3 run: either an accepted marriage with its
/// evidence record, or nothing found.
pub struct CoupleResult {
    pub marriage: MarriageEntry,
    pub evidence: EvidenceRecord,
}

fn gap_score(child_birth_year: i32, marriage_year: i32) -> i32 {
    let gap = child_birth_year - marriage_year;
    if !(0..=15).contains(&gap) {
        return 0;
    }
    match gap {
        0..=5 => 20,
        6..=10 => 15,
        _ => 10,
    }
}

fn district_score(candidate: Option<&str>, wanted: Option<&str>) -> i32 {
    match (candidate, wanted) {
        (Some(c), Some(w)) if districts_equal(c, w) => 10,
        (Some(c), Some(w)) if districts_similar(c, w) => 5,
        _ => 0,
    }
}

fn score_by_groom(entry: &MarriageEntry, query: &CoupleQuery) -> i32 {
    let mut score = 0;
    if entry.groom_surname.eq_ignore_ascii_case(&query.father_surname) {
        score += 25;
    }
    if let Some(wanted_maiden) = &query.mother_maiden_surname {
        if entry.bride_surname.eq_ignore_ascii_case(wanted_maiden) {
            score += 30;
        }
    }
    if let Some(wanted_given) = &query.father_given {
        if entry
            .groom_given
            .as_deref()
            .is_some_and(|g| names_similar(g, wanted_given))
        {
            score += 15;
        }
    }
    score += gap_score(query.child_birth_year, entry.year);
    score += district_score(entry.district.as_deref(), query.district.as_deref());
    score
}

fn score_by_bride(entry: &MarriageEntry, query: &CoupleQuery) -> i32 {
    let mut score = 0;
    if let Some(wanted_maiden) = &query.mother_maiden_surname {
        if entry.bride_surname.eq_ignore_ascii_case(wanted_maiden) {
            score += 25;
        }
    }
    if entry.groom_surname.eq_ignore_ascii_case(&query.father_surname) {
        score += 30;
    }
    if let Some(wanted_given) = &query.mother_given {
        if entry
            .bride_given
            .as_deref()
            .is_some_and(|g| names_similar(g, wanted_given))
        {
            score += 15;
        }
    }
    score += gap_score(query.child_birth_year, entry.year);
    score += district_score(entry.district.as_deref(), query.district.as_deref());
    score
}

fn marriage_evidence(entry: &MarriageEntry, source_name: &str) -> EvidenceRecord {
    EvidenceRecord {
        kind: EvidenceKind::Marriage,
        source_name: source_name.to_string(),
        independent: true,
        year: Some(entry.year),
        quarter: entry.quarter,
        district: entry.district.clone(),
        volume: entry.volume.clone(),
        page: entry.page.clone(),
        place: entry.district.clone(),
        details: format!(
            "marriage index: {} {} x {} {} ({}{})",
            entry.groom_given.as_deref().unwrap_or(""),
            entry.groom_surname,
            entry.bride_given.as_deref().unwrap_or(""),
            entry.bride_surname,
            entry.year,
            entry.quarter.map(|q| format!(" Q{q}")).unwrap_or_default(),
        ),
        supports: vec![EvidenceAspect::Parents, EvidenceAspect::Location],
        weight: 30,
    }
}

/// Find the parents' marriage for `query` (§4.6, Step 3). Tries the groom
/// side first; falls back to a bride-side search only when the groom-side
/// best score is weak *and* the mother's given name is known. Requires a
/// source with `search_primary`; returns `None` when absent (no evidence,
/// no hypothesis mutation — the orchestrator simply skips the marriage
/// pass for this target).
pub async fn find_parent_marriage(
    query: &CoupleQuery,
    registry: &SourceRegistry,
) -> Option<CoupleResult> {
    let source = registry
        .first_available_with_capability(Capability::SearchPrimary)
        .await?;

    let year_from = query.child_birth_year - 15;
    let year_to = query.child_birth_year;

    let groom_query = MarriageQuery {
        surname: query.father_surname.clone(),
        given: query.father_given.clone(),
        year_from,
        year_to,
        district: query.district.clone(),
    };
    let groom_results = source
        .search_marriages(&groom_query)
        .await
        .unwrap_or_default();

    let mut best: Option<(i32, MarriageEntry)> = None;
    for entry in &groom_results {
        let score = score_by_groom(entry, query);
        if best.as_ref().map(|(b, _)| score > *b).unwrap_or(true) {
            best = Some((score, entry.clone()));
        }
    }

    let weak_groom_side = best.as_ref().map(|(s, _)| *s < BRIDE_SEARCH_THRESHOLD).unwrap_or(true);
    if weak_groom_side {
        if let Some(mother_given) = &query.mother_given {
            let bride_query = MarriageQuery {
                surname: query
                    .mother_maiden_surname
                    .clone()
                    .unwrap_or_else(|| query.father_surname.clone()),
                given: Some(mother_given.clone()),
                year_from,
                year_to,
                district: query.district.clone(),
            };
            let bride_results = source
                .search_marriages(&bride_query)
                .await
                .unwrap_or_default();
            for entry in &bride_results {
                let score = score_by_bride(entry, query);
                if best.as_ref().map(|(b, _)| score > *b).unwrap_or(true) {
                    best = Some((score, entry.clone()));
                }
            }
        }
    }

    let (score, entry) = best?;
    if score < ACCEPT_THRESHOLD {
        return None;
    }

    Some(CoupleResult {
        evidence: marriage_evidence(&entry, source.name()),
        marriage: entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockAdapterBuilder;
    use std::sync::Arc;

    fn registry_with(marriages: Vec<MarriageEntry>) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockAdapterBuilder::new("civil-index")
                .with_capability(Capability::SearchPrimary)
                .with_marriages(marriages)
                .build(),
        ));
        registry
    }

    fn marriage(groom: &str, bride: &str, year: i32, district: &str) -> MarriageEntry {
        MarriageEntry {
            groom_surname: groom.into(),
            groom_given: Some("John".into()),
            bride_surname: bride.into(),
            bride_given: Some("Mary".into()),
            year,
            quarter: Some(2),
            district: Some(district.into()),
            volume: Some("7a".into()),
            page: Some("200".into()),
        }
    }

    #[tokio::test]
    async fn accepts_strong_groom_side_match() {
        let registry = registry_with(vec![marriage("Smith", "Jones", 1948, "Derby")]);
        let query = CoupleQuery {
            father_surname: "Smith".into(),
            father_given: Some("John".into()),
            mother_maiden_surname: Some("Jones".into()),
            mother_given: None,
            district: Some("Derby".into()),
            child_birth_year: 1950,
        };
        let result = find_parent_marriage(&query, &registry).await.unwrap();
        assert_eq!(result.marriage.bride_surname, "Jones");
        assert_eq!(result.evidence.weight, 30);
    }

    #[tokio::test]
    async fn rejects_below_acceptance_threshold() {
        let registry = registry_with(vec![marriage("Smith", "Brown", 1930, "London")]);
        let query = CoupleQuery {
            father_surname: "Smith".into(),
            father_given: None,
            mother_maiden_surname: Some("Jones".into()),
            mother_given: None,
            district: Some("Derby".into()),
            child_birth_year: 1950,
        };
        assert!(find_parent_marriage(&query, &registry).await.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_bride_side_search() {
        let registry = registry_with(vec![marriage("Unrelated", "Jones", 1948, "Derby")]);
        let query = CoupleQuery {
            father_surname: "Smith".into(),
            father_given: None,
            mother_maiden_surname: Some("Jones".into()),
            mother_given: Some("Mary".into()),
            district: Some("Derby".into()),
            child_birth_year: 1950,
        };
        // Groom-side search (surname=Smith) yields nothing at all; the
        // bride-side search (surname=Jones, given=Mary) picks it up even
        // though the groom surname itself ("Unrelated") doesn't match.
        let result = find_parent_marriage(&query, &registry).await.unwrap();
        assert_eq!(result.marriage.bride_surname, "Jones");
    }

    #[tokio::test]
    async fn no_primary_source_yields_none() {
        let registry = SourceRegistry::new();
        let query = CoupleQuery {
            father_surname: "Smith".into(),
            child_birth_year: 1950,
            ..Default::default()
        };
        assert!(find_parent_marriage(&query, &registry).await.is_none());
    }
}
