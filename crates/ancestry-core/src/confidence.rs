//! Confidence Scorer (C9, §4.8): composes a finalized evidence chain into a
//! numeric score and a categorical level.
//!
//! A known tension: §8 scenario 2 narrates a birth+marriage-only chain (no
//! census/sibling) as landing on **Probable**, but the formula below, run on
//! exactly that chain, yields 74 (**Possible** — the `I ≥ 2` branch caps
//! there without a triangle's third leg). We implement the formula exactly
//! as specified rather than special-casing the narrative outcome; see
//! `DESIGN.md` for the resolution. Scenario 4 (conflicting cross-check) does
//! match the formula exactly, which is why this reading was preferred over
//! patching the branch thresholds.

use crate::model::{ConfidenceLevel, EvidenceKind, EvidenceRecord};

fn is_independent_kind(kind: EvidenceKind) -> bool {
    matches!(
        kind,
        EvidenceKind::Birth | EvidenceKind::Marriage | EvidenceKind::Death | EvidenceKind::SiblingBirth
    )
}

fn has_independent(evidence: &[EvidenceRecord], kind: EvidenceKind) -> bool {
    evidence.iter().any(|e| e.independent && e.kind == kind)
}

fn has_any(evidence: &[EvidenceRecord], kind: EvidenceKind) -> bool {
    evidence.iter().any(|e| e.kind == kind)
}

/// The result of composing an evidence chain (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredConfidence {
    pub score: u8,
    pub level: ConfidenceLevel,
}

/// Compose a finalized evidence chain into `(score, level)` (§4.8).
///
/// - `marriage_attempted`: a parent-couple marriage search (§4.6) was run
///   for this target, whether or not it succeeded.
/// - `cross_check_verified`: the §4.7 Step-4 cross-check verdict.
/// - `reinforcement_count`: the number of §4.7 Step-5 reinforcement records
///   folded into `evidence` (sibling births, death confirmations, a second
///   census) — tracked by the caller rather than re-derived, since a
///   "reinforcement" census is only distinguishable from a "triangle" census
///   by when it was added, not by its shape.
pub fn score_confidence(
    evidence: &[EvidenceRecord],
    marriage_attempted: bool,
    cross_check_verified: bool,
    reinforcement_count: u32,
) -> ScoredConfidence {
    let w: i64 = evidence.iter().map(|e| e.weight as i64).sum();
    let i = evidence
        .iter()
        .filter(|e| e.independent && is_independent_kind(e.kind))
        .count() as i64;
    let triangle = has_independent(evidence, EvidenceKind::Birth)
        && has_independent(evidence, EvidenceKind::Marriage)
        && (has_any(evidence, EvidenceKind::Census) || has_any(evidence, EvidenceKind::SiblingBirth));
    let r = reinforcement_count as i64;

    let mut score: i64 = if triangle && r > 0 {
        (85 + (w - 55).min(15)).min(100)
    } else if triangle {
        (75 + (w - 40).min(14)).min(89)
    } else if i >= 2 {
        (50 + (w - 25).min(24)).min(74)
    } else if i >= 1 {
        (25 + (w - 10).min(24)).min(49)
    } else {
        0
    };
    score = score.max(0);

    if marriage_attempted && !cross_check_verified {
        score = score.min(60);
    }

    let score = score.clamp(0, 100) as u8;
    ScoredConfidence {
        score,
        level: ConfidenceLevel::from_score(score),
    }
}

/// Degraded-mode confidence for a tree-lead-only finding (§4.10): no
/// independent evidence exists at all, so the standard formula above would
/// always yield 0. The tree-lead fallback instead derives confidence
/// directly from the person-search match score, capped at the top of the
/// Flagged band (policy choice, §9 open question — implementers may expose
/// this cap as configuration but must not raise it into Possible without
/// additional independent evidence).
pub fn tree_lead_confidence(match_score: i32) -> u8 {
    (25 + match_score).clamp(0, 49) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EvidenceAspect;

    fn record(kind: EvidenceKind, independent: bool, weight: u32) -> EvidenceRecord {
        EvidenceRecord {
            kind,
            source_name: "civil-index".into(),
            independent,
            year: Some(1950),
            quarter: None,
            district: Some("Derby".into()),
            volume: None,
            page: None,
            place: None,
            details: String::new(),
            supports: vec![EvidenceAspect::Identity],
            weight,
        }
    }

    #[test]
    fn full_triangle_with_reinforcement_is_verified() {
        // Scenario 3: birth + marriage + census + sibling.
        let evidence = vec![
            record(EvidenceKind::Birth, true, 25),
            record(EvidenceKind::Marriage, true, 30),
            record(EvidenceKind::Census, true, 15),
            record(EvidenceKind::SiblingBirth, true, 15),
        ];
        let result = score_confidence(&evidence, true, true, 1);
        assert_eq!(result.level, ConfidenceLevel::Verified);
        assert!(evidence.iter().map(|e| e.weight).sum::<u32>() >= 70);
    }

    #[test]
    fn birth_and_marriage_without_triangle_caps_at_possible() {
        // Scenario 2's literal arithmetic (see module docs for the
        // narrative discrepancy this resolves).
        let evidence = vec![
            record(EvidenceKind::Birth, true, 25),
            record(EvidenceKind::Marriage, true, 30),
        ];
        let result = score_confidence(&evidence, true, true, 0);
        assert_eq!(result.score, 74);
        assert_eq!(result.level, ConfidenceLevel::Possible);
    }

    #[test]
    fn conflicting_cross_check_caps_at_sixty() {
        // Scenario 4.
        let evidence = vec![
            record(EvidenceKind::Birth, true, 25),
            record(EvidenceKind::Marriage, true, 30),
        ];
        let result = score_confidence(&evidence, true, false, 0);
        assert_eq!(result.score, 60);
        assert_eq!(result.level, ConfidenceLevel::Possible);
    }

    #[test]
    fn no_evidence_is_not_found() {
        let result = score_confidence(&[], false, false, 0);
        assert_eq!(result.score, 0);
        assert_eq!(result.level, ConfidenceLevel::NotFound);
    }

    #[test]
    fn single_independent_record_is_flagged_band() {
        let evidence = vec![record(EvidenceKind::Birth, true, 25)];
        let result = score_confidence(&evidence, false, false, 0);
        assert_eq!(result.level, ConfidenceLevel::Flagged);
        assert!(result.score <= 49);
    }

    #[test]
    fn tree_lead_fallback_caps_at_flagged_band() {
        // Scenario 5: match score 35 => 25+35=60, capped to 49.
        assert_eq!(tree_lead_confidence(35), 49);
        assert_eq!(tree_lead_confidence(0), 25);
        assert_eq!(tree_lead_confidence(-30), 0);
    }
}
