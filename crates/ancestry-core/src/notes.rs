//! Notes Parser (C4, §4.3): extracts anchor facts for ascendancy numbers
//! 2–7 from a subject's free-text notes. Rules are applied in order; the
//! first rule to match a given `A` wins — later rules only fill gaps (birth
//! date/place) left by the anchor rules, never override them.

use crate::model::{AnchorFacts, NotesAnchorMap};
use crate::normalize::parse_name;
use once_cell::sync::Lazy;
use regex::Regex;

/// A person name (1–4 capitalized tokens) with an optional trailing
/// `(YYYY[-YYYY|present|living])` year-range clause. Three capture groups:
/// name, birth year, death-year slot.
const PERSON_YEARS: &str = r"([A-Z][A-Za-z'.-]+(?:\s+[A-Za-z'.-]+){0,3})(?:\s*\((\d{4})(?:\s*-\s*(\d{4}|present|living))?\))?";

static FATHER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)father\D*?{PERSON_YEARS}")).unwrap());
static MOTHER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)mother\D*?{PERSON_YEARS}")).unwrap());

static PATERNAL_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)paternal\s*(?:gp|grandparents)\s*:\s*{PERSON_YEARS}\s*and\s*{PERSON_YEARS}"
    ))
    .unwrap()
});
static MATERNAL_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)maternal\s*(?:gp|grandparents)\s*:\s*{PERSON_YEARS}\s*and\s*{PERSON_YEARS}"
    ))
    .unwrap()
});

static PATERNAL_GRANDFATHER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)paternal\s+grandfather\s+was\s+{PERSON_YEARS}")).unwrap()
});
static PATERNAL_GRANDMOTHER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)paternal\s+grandmother\s+was\s+{PERSON_YEARS}")).unwrap()
});
static MATERNAL_GRANDFATHER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)maternal\s+grandfather\s+was\s+{PERSON_YEARS}")).unwrap()
});
static MATERNAL_GRANDMOTHER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)maternal\s+grandmother\s+was\s+{PERSON_YEARS}")).unwrap()
});

static BORN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)born\s+((?:\d{1,2}\s+)?[A-Za-z]+\s+\d{4}|\d{4})").unwrap());
static PLACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:from|in|of)\s+([A-Z][A-Za-z]+(?:,\s*[A-Z][A-Za-z]+)*)").unwrap());

/// A parenthetical `(capture_groups)` match: name plus a birth year and an
/// optional death year (or "present"/"living", meaning the person is
/// recorded as alive).
struct PersonYears<'a> {
    name: &'a str,
    birth_year: Option<&'a str>,
    death_slot: Option<&'a str>,
}

fn anchor_from_match(m: &PersonYears) -> AnchorFacts {
    let parts = parse_name(m.name);
    let death_date = match m.death_slot {
        Some(slot) if slot.eq_ignore_ascii_case("present") || slot.eq_ignore_ascii_case("living") => {
            None
        }
        Some(year) => Some(year.to_string()),
        None => None,
    };
    AnchorFacts {
        given_name: Some(parts.given),
        surname: parts.surname,
        birth_date: m.birth_year.map(str::to_string),
        birth_place: None,
        death_date,
    }
}

fn single_capture<'a>(caps: &'a regex::Captures<'a>, base: usize) -> PersonYears<'a> {
    PersonYears {
        name: caps.get(base).unwrap().as_str(),
        birth_year: caps.get(base + 1).map(|m| m.as_str()),
        death_slot: caps.get(base + 2).map(|m| m.as_str()),
    }
}

/// Extract anchor facts for `A ∈ {2..7}` from free-text notes (§4.3).
/// Rules are applied in order; the first rule that matches wins per `A`.
pub fn parse_notes(notes: &str) -> NotesAnchorMap {
    let mut map = NotesAnchorMap::new();

    if let Some(caps) = FATHER_RE.captures(notes) {
        map.insert(2, anchor_from_match(&single_capture(&caps, 1)));
    }
    if let Some(caps) = MOTHER_RE.captures(notes) {
        map.insert(3, anchor_from_match(&single_capture(&caps, 1)));
    }

    if let Some(caps) = PATERNAL_PAIR_RE.captures(notes) {
        map.insert(4, anchor_from_match(&single_capture(&caps, 1)));
        map.insert(5, anchor_from_match(&single_capture(&caps, 4)));
    } else {
        if let Some(caps) = PATERNAL_GRANDFATHER_RE.captures(notes) {
            map.insert(4, anchor_from_match(&single_capture(&caps, 1)));
        }
        if let Some(caps) = PATERNAL_GRANDMOTHER_RE.captures(notes) {
            map.insert(5, anchor_from_match(&single_capture(&caps, 1)));
        }
    }

    if let Some(caps) = MATERNAL_PAIR_RE.captures(notes) {
        map.insert(6, anchor_from_match(&single_capture(&caps, 1)));
        map.insert(7, anchor_from_match(&single_capture(&caps, 4)));
    } else {
        if let Some(caps) = MATERNAL_GRANDFATHER_RE.captures(notes) {
            map.insert(6, anchor_from_match(&single_capture(&caps, 1)));
        }
        if let Some(caps) = MATERNAL_GRANDMOTHER_RE.captures(notes) {
            map.insert(7, anchor_from_match(&single_capture(&caps, 1)));
        }
    }

    // Rule 5/6: fill missing birth date/place near each anchor's surname.
    for facts in map.values_mut() {
        let Some(surname) = facts.surname.clone() else {
            continue;
        };
        if let Some(window) = window_around(notes, &surname) {
            if facts.birth_date.is_none() {
                if let Some(caps) = BORN_RE.captures(&window) {
                    facts.birth_date = Some(caps[1].to_string());
                }
            }
            if facts.birth_place.is_none() {
                if let Some(caps) = PLACE_RE.captures(&window) {
                    facts.birth_place = Some(caps[1].to_string());
                }
            }
        }
    }

    map
}

/// A ~80-character window of `text` centered on the first occurrence of
/// `surname`, used to scope the generic "born"/"from|in|of" rules (§4.3
/// rules 5–6: "near a known surname") without matching unrelated sentences.
fn window_around(text: &str, surname: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let idx = lower.find(&surname.to_lowercase())?;
    let start = idx.saturating_sub(80);
    let end = (idx + surname.len() + 80).min(text.len());
    // Clamp to char boundaries.
    let start = (start..=idx).find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    let end = (end..=text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());
    Some(text[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn father_rule_anchors_a2() {
        let notes = "Notes: father was John SMITH (1920-1990), a coal miner.";
        let map = parse_notes(notes);
        let f = map.get(&2).expect("A=2 anchor");
        assert_eq!(f.given_name.as_deref(), Some("John"));
        assert_eq!(f.surname.as_deref(), Some("SMITH"));
        assert_eq!(f.birth_date.as_deref(), Some("1920"));
        assert_eq!(f.death_date.as_deref(), Some("1990"));
    }

    #[test]
    fn mother_rule_anchors_a3() {
        let notes = "mother Mary JONES (1925-living) still going strong";
        let map = parse_notes(notes);
        let m = map.get(&3).expect("A=3 anchor");
        assert_eq!(m.surname.as_deref(), Some("JONES"));
        assert_eq!(m.birth_date.as_deref(), Some("1925"));
        assert_eq!(m.death_date, None, "living ⇒ no death date");
    }

    #[test]
    fn paternal_grandparents_pair_anchors_a4_a5() {
        let notes = "paternal grandparents: William SMITH (1895-1960) and Agnes SMITH (1898-1975)";
        let map = parse_notes(notes);
        assert_eq!(map.get(&4).unwrap().given_name.as_deref(), Some("William"));
        assert_eq!(map.get(&5).unwrap().given_name.as_deref(), Some("Agnes"));
    }

    #[test]
    fn maternal_grandparent_fallback_pattern() {
        let notes = "maternal grandfather was Thomas JONES (1890-1955). maternal grandmother was Edith JONES (1893-1970)";
        let map = parse_notes(notes);
        assert_eq!(map.get(&6).unwrap().given_name.as_deref(), Some("Thomas"));
        assert_eq!(map.get(&7).unwrap().given_name.as_deref(), Some("Edith"));
    }

    #[test]
    fn born_rule_fills_missing_birth_date() {
        let notes = "father was John SMITH, born 15 March 1922 in Derby.";
        let map = parse_notes(notes);
        let f = map.get(&2).expect("A=2 anchor via born rule");
        assert_eq!(f.birth_date.as_deref(), Some("15 March 1922"));
    }

    #[test]
    fn place_rule_fills_missing_birth_place() {
        let notes = "father was John SMITH (1920-1990), from Derby, Derbyshire.";
        let map = parse_notes(notes);
        let f = map.get(&2).unwrap();
        assert_eq!(f.birth_place.as_deref(), Some("Derby, Derbyshire"));
    }

    #[test]
    fn no_anchors_from_empty_notes() {
        assert!(parse_notes("").is_empty());
        assert!(parse_notes("just some unrelated text").is_empty());
    }
}
