//! Cross-Check & Reinforcement (C8, §4.7, Steps 4–5): verifies birth vs
//! marriage consistency and seeks additional corroborating evidence.

use crate::model::{EvidenceAspect, EvidenceKind, EvidenceRecord};
use crate::normalize::{district_of, districts_equal, districts_similar};
use crate::sources::{BirthQuery, Capability, SourceRegistry};
use std::collections::HashSet;

const VERIFIED_THRESHOLD: i32 = 25;
const SIBLING_YEAR_WINDOW: i32 = 8;
const SECOND_CENSUS_MIN_GAP_YEARS: u32 = 8;

/// Inputs to the Step-4 cross-check: the birth-side facts from the
/// hypothesis and the marriage-side facts from the accepted couple record.
#[derive(Debug, Clone, Default)]
pub struct CrossCheckInput {
    pub birth_surname: String,
    pub birth_mother_maiden_surname: Option<String>,
    pub birth_district: Option<String>,
    pub birth_year: Option<i32>,
    pub marriage_groom_surname: String,
    pub marriage_bride_surname: String,
    pub marriage_district: Option<String>,
    pub marriage_year: i32,
}

/// The result of a Step-4 cross-check: a diagnostic score and the pass/fail
/// verdict (§4.7: verified iff score ≥ 25).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossCheckVerdict {
    pub score: i32,
    pub verified: bool,
}

/// Cross-check birth facts against an accepted marriage record (§4.7, Step 4).
pub fn cross_check(input: &CrossCheckInput) -> CrossCheckVerdict {
    let mut score = 0;

    if input.birth_surname.eq_ignore_ascii_case(&input.marriage_groom_surname) {
        score += 15;
    }

    if let Some(maiden) = &input.birth_mother_maiden_surname {
        if maiden.eq_ignore_ascii_case(&input.marriage_bride_surname) {
            score += 15;
        }
    }

    match (input.birth_district.as_deref(), input.marriage_district.as_deref()) {
        (Some(a), Some(b)) if districts_equal(a, b) => score += 10,
        (Some(a), Some(b)) if districts_similar(a, b) => score += 5,
        _ => {}
    }

    if let Some(birth_year) = input.birth_year {
        let gap = birth_year - input.marriage_year;
        if (0..=15).contains(&gap) {
            score += 10;
        }
    }

    CrossCheckVerdict {
        score,
        verified: score >= VERIFIED_THRESHOLD,
    }
}

/// One Step-5 reinforcement finding: an additional evidence record plus
/// whether it counts toward the scorer's reinforcement tally (§4.8's `R`).
pub struct Reinforcement {
    pub evidence: EvidenceRecord,
}

/// Look for a sibling birth: same mother-maiden surname, same district,
/// within a `±8`-year window of `birth_year`, excluding the subject's own
/// (year, forenames) combination. Returns the first match (§4.7, Step 5).
pub async fn find_sibling_birth(
    mother_maiden_surname: &str,
    surname: &str,
    district: Option<&str>,
    birth_year: i32,
    own_forenames: &str,
    registry: &SourceRegistry,
) -> Option<Reinforcement> {
    let source = registry
        .first_available_with_capability(Capability::SearchPrimary)
        .await?;

    let query = BirthQuery {
        surname: surname.to_string(),
        given: String::new(),
        year_from: birth_year - SIBLING_YEAR_WINDOW,
        year_to: birth_year + SIBLING_YEAR_WINDOW,
        district: district.map(str::to_string),
    };
    let entries = source.search_births(&query).await.unwrap_or_default();

    let sibling = entries.into_iter().find(|e| {
        e.mother_maiden_surname
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(mother_maiden_surname))
            && (e.year != birth_year || !e.given.eq_ignore_ascii_case(own_forenames))
    })?;

    Some(Reinforcement {
        evidence: EvidenceRecord {
            kind: EvidenceKind::SiblingBirth,
            source_name: source.name().to_string(),
            independent: true,
            year: Some(sibling.year),
            quarter: sibling.quarter,
            district: sibling.district.clone(),
            volume: sibling.volume.clone(),
            page: sibling.page.clone(),
            place: sibling.district.clone(),
            details: format!(
                "sibling birth: {} {} ({})",
                sibling.given, sibling.surname, sibling.year
            ),
            supports: vec![EvidenceAspect::Identity, EvidenceAspect::Parents],
            weight: 15,
        },
    })
}

/// Confirm a death against a primary index, using the tree-recorded death
/// year if one is known (§4.7, Step 5).
pub async fn confirm_death_reinforcement(
    given: &str,
    surname: &str,
    death_year: i32,
    registry: &SourceRegistry,
) -> Option<Reinforcement> {
    let source = registry
        .first_available_with_capability(Capability::Confirmation)
        .await?;
    let death = source.confirm_death(given, surname, death_year).await.ok()??;
    Some(Reinforcement {
        evidence: EvidenceRecord {
            kind: EvidenceKind::Death,
            source_name: source.name().to_string(),
            independent: true,
            year: Some(death.year),
            quarter: None,
            district: death.district.clone(),
            volume: None,
            page: None,
            place: death.district.clone(),
            details: format!("death index: {} {} ({})", death.given, death.surname, death.year),
            supports: vec![EvidenceAspect::Identity],
            weight: 10,
        },
    })
}

/// A second census: a tree-fact census from a decade more than 8 years
/// away from any census year already present in the evidence chain
/// (§4.7, Step 5).
pub fn second_census_reinforcement(
    census_candidates: &[(u32, String)],
    existing_evidence: &[EvidenceRecord],
    source_name: &str,
) -> Option<Reinforcement> {
    let existing_years: HashSet<i32> = existing_evidence
        .iter()
        .filter(|e| e.kind == EvidenceKind::Census)
        .filter_map(|e| e.year)
        .collect();

    let (year, place) = census_candidates.iter().find(|(year, _)| {
        existing_years
            .iter()
            .all(|existing| (*existing - *year as i32).unsigned_abs() > SECOND_CENSUS_MIN_GAP_YEARS)
    })?;

    Some(Reinforcement {
        evidence: EvidenceRecord {
            kind: EvidenceKind::Census,
            source_name: source_name.to_string(),
            independent: true,
            year: Some(*year as i32),
            quarter: None,
            district: district_of(place),
            volume: None,
            page: None,
            place: Some(place.clone()),
            details: format!("second census {year} at {place}"),
            supports: vec![EvidenceAspect::Identity, EvidenceAspect::Location],
            weight: 10,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{BirthEntry, MockAdapterBuilder};
    use std::sync::Arc;

    #[test]
    fn consistent_birth_and_marriage_is_verified() {
        let input = CrossCheckInput {
            birth_surname: "Smith".into(),
            birth_mother_maiden_surname: Some("Jones".into()),
            birth_district: Some("Derby".into()),
            birth_year: Some(1950),
            marriage_groom_surname: "Smith".into(),
            marriage_bride_surname: "Jones".into(),
            marriage_district: Some("Derby".into()),
            marriage_year: 1948,
        };
        let verdict = cross_check(&input);
        assert!(verdict.verified);
        assert_eq!(verdict.score, 15 + 15 + 10 + 10);
    }

    #[test]
    fn conflicting_maiden_surname_fails_cross_check() {
        // Scenario 4: marriage bride surname BROWN vs birth mother-maiden JONES.
        let input = CrossCheckInput {
            birth_surname: "Smith".into(),
            birth_mother_maiden_surname: Some("Jones".into()),
            birth_district: None,
            birth_year: Some(1950),
            marriage_groom_surname: "Smith".into(),
            marriage_bride_surname: "Brown".into(),
            marriage_district: None,
            marriage_year: 1948,
        };
        let verdict = cross_check(&input);
        assert_eq!(verdict.score, 15 + 10); // surname match + year gap only
        assert!(!verdict.verified);
    }

    #[tokio::test]
    async fn sibling_birth_excludes_self() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockAdapterBuilder::new("civil-index")
                .with_capability(Capability::SearchPrimary)
                .with_births(vec![
                    BirthEntry {
                        surname: "Smith".into(),
                        given: "John".into(),
                        year: 1950,
                        quarter: Some(2),
                        district: Some("Derby".into()),
                        volume: Some("7a".into()),
                        page: Some("123".into()),
                        mother_maiden_surname: Some("Jones".into()),
                    },
                    BirthEntry {
                        surname: "Smith".into(),
                        given: "Agnes".into(),
                        year: 1953,
                        quarter: Some(1),
                        district: Some("Derby".into()),
                        volume: Some("7a".into()),
                        page: Some("130".into()),
                        mother_maiden_surname: Some("Jones".into()),
                    },
                ])
                .build(),
        ));

        let result = find_sibling_birth("Jones", "Smith", Some("Derby"), 1950, "John", &registry)
            .await
            .expect("sibling found");
        assert_eq!(result.evidence.year, Some(1953));
    }

    #[test]
    fn second_census_requires_gap_over_eight_years() {
        let existing = vec![EvidenceRecord {
            kind: EvidenceKind::Census,
            source_name: "familytree".into(),
            independent: true,
            year: Some(1931),
            quarter: None,
            district: None,
            volume: None,
            page: None,
            place: None,
            details: String::new(),
            supports: vec![],
            weight: 15,
        }];
        let too_close = vec![(1938u32, "Derby".to_string())];
        assert!(second_census_reinforcement(&too_close, &existing, "familytree").is_none());

        let far_enough = vec![(1951u32, "Derby".to_string())];
        assert!(second_census_reinforcement(&far_enough, &existing, "familytree").is_some());
    }
}
