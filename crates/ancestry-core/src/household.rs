//! Household Resolver (C6, §4.5, Step 2): attaches a probable tree-person
//! identity to a birth hypothesis.

use crate::model::{EvidenceAspect, EvidenceKind, EvidenceRecord, Hypothesis, HypothesisStatus, TreePersonAttachment};
use crate::normalize::{
    district_contains, district_of, districts_equal, is_non_uk_place, names_similar, parse_name,
};
use crate::sources::{Capability, FactSet, PersonCandidate, PersonSearchQuery, SourceRegistry};
use std::collections::HashSet;

const PRIMARY_THRESHOLD: i32 = 60;
const ALTERNATE_THRESHOLD: i32 = 30;
const PERSON_SEARCH_COUNT: u32 = 15;
const CHILDHOOD_CENSUS_MAX_AGE: u32 = 15;

fn district_tier_score(candidate_district: Option<&str>, target_district: Option<&str>) -> i32 {
    match (candidate_district, target_district) {
        (Some(c), Some(t)) if districts_equal(c, t) => 15,
        (Some(c), Some(t)) if district_contains(c, t) => 10,
        _ => 0,
    }
}

fn mother_surname_score(candidate_mother_name: Option<&str>, wanted_maiden: Option<&str>) -> i32 {
    let (Some(name), Some(wanted)) = (candidate_mother_name, wanted_maiden) else {
        return 0;
    };
    let parts = parse_name(name);
    let Some(surname) = parts.surname else {
        return 0;
    };
    if surname.eq_ignore_ascii_case(wanted) {
        25
    } else if surname.len() >= 3
        && wanted.len() >= 3
        && surname[..3].eq_ignore_ascii_case(&wanted[..3])
    {
        10
    } else {
        0
    }
}

fn father_surname_score(candidate_father_name: Option<&str>, wanted_surname: &str) -> i32 {
    candidate_father_name
        .and_then(|n| parse_name(n).surname)
        .filter(|s| s.eq_ignore_ascii_case(wanted_surname))
        .map(|_| 15)
        .unwrap_or(0)
}

fn score_household_candidate(
    candidate: &PersonCandidate,
    hypothesis: &Hypothesis,
) -> i32 {
    let mut score = 0;
    if names_similar(&hypothesis.forenames, &candidate.given) {
        score += 20;
    }
    score += district_tier_score(
        candidate.birth_place.as_deref().and_then(district_of).as_deref(),
        hypothesis.district.as_deref(),
    );
    if let (Some(target_year), Some(candidate_date)) = (
        hypothesis.birth_year,
        candidate.birth_date.as_ref().and_then(|d| d.parse::<i32>().ok()),
    ) {
        let diff = (target_year - candidate_date).abs();
        score += match diff {
            0..=1 => 15,
            2 => 10,
            3 => 5,
            _ => 0,
        };
    }
    score += father_surname_score(candidate.father_name.as_deref(), &hypothesis.surname);
    score += mother_surname_score(
        candidate.mother_name.as_deref(),
        hypothesis.mother_maiden_surname.as_deref(),
    );
    score
}

fn is_childhood_census(facts: &FactSet, birth_year: Option<i32>) -> Option<(u32, String)> {
    let birth_year = birth_year?;
    facts.census.iter().find_map(|c| {
        let age = c
            .age
            .unwrap_or_else(|| (c.year as i32 - birth_year).max(0) as u32);
        (age <= CHILDHOOD_CENSUS_MAX_AGE).then(|| (c.year, c.place.clone()))
    })
}

/// Resolve a household candidate for `hypothesis` (§4.5, Step 2). Requires a
/// source with both `person_search` and `tree_traversal`; otherwise the
/// hypothesis is returned unchanged (the orchestrator treats Step 2 as a
/// no-op in that degraded mode — §4.10).
pub async fn resolve_household(
    mut hypothesis: Hypothesis,
    registry: &SourceRegistry,
    rejected_person_ids: &HashSet<String>,
) -> Hypothesis {
    let Some(source) = registry
        .with_capability(Capability::PersonSearch)
        .into_iter()
        .find(|s| s.has_capability(Capability::TreeTraversal))
    else {
        return hypothesis;
    };
    if !source.is_available().await {
        return hypothesis;
    }

    let query = PersonSearchQuery {
        given: hypothesis.forenames.clone(),
        surname: hypothesis.surname.clone(),
        birth_date: hypothesis.birth_year.map(|y| y.to_string()),
        birth_place: None,
        father_surname: None,
        mother_surname: hypothesis.mother_maiden_surname.clone(),
        mother_given_name: None,
        count: PERSON_SEARCH_COUNT,
    };
    let candidates = source.search_person(&query).await.unwrap_or_default();

    let filtered: Vec<PersonCandidate> = candidates
        .into_iter()
        .filter(|c| !rejected_person_ids.contains(&c.person_id))
        .filter(|c| {
            c.birth_place
                .as_deref()
                .map(|p| {
                    let non_uk = is_non_uk_place(p);
                    !non_uk
                })
                .unwrap_or(true)
        })
        .collect();

    if filtered.is_empty() {
        hypothesis.status = HypothesisStatus::Discarded;
        return hypothesis;
    }

    let facts = futures::future::join_all(
        filtered
            .iter()
            .map(|c| async { source.extract_facts(&c.person_id).await.unwrap_or_default() }),
    )
    .await;

    let mut best: Option<(i32, &PersonCandidate, &FactSet, Option<(u32, String)>)> = None;
    for (candidate, fact_set) in filtered.iter().zip(facts.iter()) {
        let mut score = score_household_candidate(candidate, &hypothesis);
        let census_hit = is_childhood_census(fact_set, hypothesis.birth_year);
        if census_hit.is_some() {
            score += 10;
        }
        if best.as_ref().map(|(best_score, ..)| score > *best_score).unwrap_or(true) {
            best = Some((score, candidate, fact_set, census_hit));
        }
    }

    let Some((score, candidate, _facts, census_hit)) = best else {
        hypothesis.status = HypothesisStatus::Discarded;
        return hypothesis;
    };

    hypothesis.status = if score >= PRIMARY_THRESHOLD {
        HypothesisStatus::Primary
    } else if score >= ALTERNATE_THRESHOLD {
        HypothesisStatus::Alternate
    } else {
        HypothesisStatus::Discarded
    };

    if hypothesis.status != HypothesisStatus::Discarded {
        if let Some((year, place)) = &census_hit {
            hypothesis.evidence_prefix.push(EvidenceRecord {
                kind: EvidenceKind::Census,
                source_name: source.name().to_string(),
                independent: true,
                year: Some(*year as i32),
                quarter: None,
                district: district_of(place),
                volume: None,
                page: None,
                place: Some(place.clone()),
                details: format!("childhood census {year} at {place}"),
                supports: vec![EvidenceAspect::Identity, EvidenceAspect::Location],
                weight: 15,
            });
        }
        hypothesis.tree_person = Some(TreePersonAttachment {
            person_id: candidate.person_id.clone(),
            name: Some(format!("{} {}", candidate.given, candidate.surname)),
            birth_date: candidate.birth_date.clone(),
            birth_place: candidate.birth_place.clone(),
            death_date: candidate.death_date.clone(),
            father_name: candidate.father_name.clone(),
            mother_name: candidate.mother_name.clone(),
            childhood_census: census_hit,
        });
    }

    hypothesis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockAdapterBuilder;
    use std::sync::Arc;

    fn base_hypothesis() -> Hypothesis {
        let mut hyp = Hypothesis::new("Smith", "John");
        hyp.birth_year = Some(1920);
        hyp.district = Some("Derby".into());
        hyp.mother_maiden_surname = Some("Jones".into());
        hyp
    }

    fn registry_with(
        persons: Vec<PersonCandidate>,
        facts: Vec<(String, FactSet)>,
    ) -> SourceRegistry {
        let mut builder = MockAdapterBuilder::new("familytree")
            .with_capability(Capability::PersonSearch)
            .with_capability(Capability::TreeTraversal)
            .with_persons(persons);
        for (id, f) in facts {
            builder = builder.with_facts(id, f);
        }
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(builder.build()));
        registry
    }

    #[tokio::test]
    async fn best_candidate_above_sixty_is_primary() {
        let candidate = PersonCandidate {
            person_id: "p1".into(),
            given: "John".into(),
            surname: "Smith".into(),
            birth_date: Some("1920".into()),
            birth_place: Some("Derby, Derbyshire, England".into()),
            death_date: None,
            father_name: Some("William Smith".into()),
            mother_name: Some("Mary Jones".into()),
        };
        let registry = registry_with(vec![candidate], vec![]);
        let hyp = resolve_household(base_hypothesis(), &registry, &HashSet::new()).await;
        assert_eq!(hyp.status, HypothesisStatus::Primary);
        assert!(hyp.tree_person.is_some());
    }

    #[tokio::test]
    async fn weak_candidate_is_discarded() {
        let candidate = PersonCandidate {
            person_id: "p2".into(),
            given: "Robert".into(),
            surname: "Smith".into(),
            birth_date: Some("1940".into()),
            birth_place: Some("Glasgow, Scotland".into()),
            ..Default::default()
        };
        let registry = registry_with(vec![candidate], vec![]);
        let hyp = resolve_household(base_hypothesis(), &registry, &HashSet::new()).await;
        assert_eq!(hyp.status, HypothesisStatus::Discarded);
    }

    #[tokio::test]
    async fn rejected_person_ids_are_filtered_out() {
        let candidate = PersonCandidate {
            person_id: "p1".into(),
            given: "John".into(),
            surname: "Smith".into(),
            birth_date: Some("1920".into()),
            birth_place: Some("Derby, Derbyshire, England".into()),
            father_name: Some("William Smith".into()),
            mother_name: Some("Mary Jones".into()),
            death_date: None,
        };
        let registry = registry_with(vec![candidate], vec![]);
        let mut rejected = HashSet::new();
        rejected.insert("p1".to_string());
        let hyp = resolve_household(base_hypothesis(), &registry, &rejected).await;
        assert_eq!(hyp.status, HypothesisStatus::Discarded);
    }

    #[tokio::test]
    async fn non_uk_place_without_uk_indicator_is_skipped() {
        let candidate = PersonCandidate {
            person_id: "p3".into(),
            given: "John".into(),
            surname: "Smith".into(),
            birth_date: Some("1920".into()),
            birth_place: Some("Boston, MA, United States".into()),
            father_name: Some("William Smith".into()),
            mother_name: Some("Mary Jones".into()),
            death_date: None,
        };
        let registry = registry_with(vec![candidate], vec![]);
        let hyp = resolve_household(base_hypothesis(), &registry, &HashSet::new()).await;
        assert_eq!(hyp.status, HypothesisStatus::Discarded);
    }

    #[tokio::test]
    async fn childhood_census_adds_bonus_and_evidence() {
        let candidate = PersonCandidate {
            person_id: "p1".into(),
            given: "John".into(),
            surname: "Smith".into(),
            birth_date: Some("1920".into()),
            birth_place: Some("Derby, Derbyshire, England".into()),
            father_name: Some("William Smith".into()),
            mother_name: Some("Mary Jones".into()),
            death_date: None,
        };
        let facts = FactSet {
            census: vec![crate::sources::CensusFact {
                year: 1931,
                place: "Derby, Derbyshire".into(),
                age: Some(11),
            }],
        };
        let registry = registry_with(vec![candidate], vec![("p1".to_string(), facts)]);
        let hyp = resolve_household(base_hypothesis(), &registry, &HashSet::new()).await;
        assert_eq!(hyp.status, HypothesisStatus::Primary);
        assert!(hyp
            .evidence_prefix
            .iter()
            .any(|e| e.kind == EvidenceKind::Census));
    }
}
