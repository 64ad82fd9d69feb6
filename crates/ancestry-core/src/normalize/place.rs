//! Place sanitation and classification (§4.1).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Fixed glossary translating known non-Latin place names (Cyrillic country
/// and US-state spellings, Mongolian country names) to their English forms.
static NON_LATIN_GLOSSARY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("россия", "Russia"),
        ("москва", "Moscow"),
        ("украина", "Ukraine"),
        ("монгол улс", "Mongolia"),
        ("улаанбаатар", "Ulaanbaatar"),
        ("калифорния", "California"),
        ("нью-йорк", "New York"),
        ("техас", "Texas"),
    ])
});

/// Fixed glossary of Old-English county spellings to modern names.
static OLD_ENGLISH_COUNTY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("deorbyscir", "Derbyshire"),
        ("eoforwicscir", "Yorkshire"),
        ("glowecestrescir", "Gloucestershire"),
        ("snotinghamscir", "Nottinghamshire"),
        ("hamtunscir", "Hampshire"),
        ("defnascir", "Devonshire"),
        ("sumorsaete", "Somerset"),
    ])
});

static NON_LATIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]").unwrap());
static MULTI_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*,+").unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Sanitize a place string: translate known non-Latin glosses, strip
/// residual non-Latin characters, collapse doubled commas/whitespace, and
/// modernize Old-English county spellings.
pub fn sanitize_place(raw: &str) -> String {
    let mut s = raw.to_string();

    for (gloss, english) in NON_LATIN_GLOSSARY.iter() {
        if s.to_lowercase().contains(gloss) {
            let re = Regex::new(&format!("(?i){}", regex::escape(gloss))).unwrap();
            s = re.replace_all(&s, *english).to_string();
        }
    }

    s = NON_LATIN_RE.replace_all(&s, "").to_string();
    s = MULTI_COMMA_RE.replace_all(&s, ",").to_string();
    s = MULTI_SPACE_RE.replace_all(&s, " ").to_string();
    s = s.trim().trim_matches(',').trim().to_string();

    for (old, modern) in OLD_ENGLISH_COUNTY.iter() {
        if s.to_lowercase().contains(old) {
            let re = Regex::new(&format!("(?i){}", regex::escape(old))).unwrap();
            s = re.replace_all(&s, *modern).to_string();
        }
    }

    s
}

static UK_COUNTIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "derbyshire",
        "yorkshire",
        "lancashire",
        "cheshire",
        "nottinghamshire",
        "staffordshire",
        "warwickshire",
        "hampshire",
        "kent",
        "essex",
        "surrey",
        "sussex",
        "norfolk",
        "suffolk",
        "devon",
        "devonshire",
        "cornwall",
        "somerset",
        "dorset",
        "gloucestershire",
        "worcestershire",
        "shropshire",
        "cumberland",
        "westmorland",
        "northumberland",
        "durham",
        "lincolnshire",
        "leicestershire",
        "northamptonshire",
        "buckinghamshire",
        "bedfordshire",
        "hertfordshire",
        "middlesex",
        "berkshire",
        "oxfordshire",
        "wiltshire",
        "huntingdonshire",
        "rutland",
        "cambridgeshire",
        "monmouthshire",
    ])
});

static UK_COUNTRIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "england",
        "scotland",
        "wales",
        "northern ireland",
        "united kingdom",
        "uk",
        "great britain",
    ])
});

static NON_UK_COUNTRIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "united states",
        "usa",
        "us",
        "canada",
        "australia",
        "new zealand",
        "germany",
        "france",
        "russia",
        "mongolia",
        "ireland",
        "south africa",
        "india",
    ])
});

fn is_two_letter_state_code(token: &str) -> bool {
    token.len() == 2 && token.chars().all(|c| c.is_ascii_alphabetic())
}

fn comma_tokens(place: &str) -> Vec<String> {
    place
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Does any comma-separated token name a recognized UK county or country?
/// Input is folded through [`sanitize_place`] first (§9 "locale-aware
/// parsing": all external place strings are sanitized before comparison).
pub fn is_uk_place(place: &str) -> bool {
    let tokens = comma_tokens(&sanitize_place(place));
    tokens
        .iter()
        .any(|t| UK_COUNTIES.contains(t.as_str()) || UK_COUNTRIES.contains(t.as_str()))
}

/// Does the place name a recognized non-UK country (or a two-letter US state
/// code as its final token), provided it carries no UK indicator?
pub fn is_non_uk_place(place: &str) -> bool {
    if is_uk_place(place) {
        return false;
    }
    let tokens = comma_tokens(&sanitize_place(place));
    let last_is_state_code = tokens
        .last()
        .is_some_and(|t| is_two_letter_state_code(t));
    last_is_state_code || tokens.iter().any(|t| NON_UK_COUNTRIES.contains(t.as_str()))
}

/// The granularity of geographic detail a place string names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specificity {
    Town,
    County,
    Country,
    Partial,
    None,
}

struct PlaceTriple {
    town: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

fn parse_triple(place: &str) -> PlaceTriple {
    let tokens = comma_tokens(place);
    if tokens.is_empty() {
        return PlaceTriple {
            town: None,
            county: None,
            country: None,
        };
    }

    let last = tokens.last().unwrap().clone();
    let country = if UK_COUNTRIES.contains(last.as_str())
        || NON_UK_COUNTRIES.contains(last.as_str())
        || is_two_letter_state_code(&last)
    {
        Some(last.clone())
    } else {
        None
    };

    let remaining: Vec<String> = if country.is_some() {
        tokens[..tokens.len() - 1].to_vec()
    } else {
        tokens.clone()
    };

    match remaining.len() {
        0 => PlaceTriple {
            town: None,
            county: None,
            country,
        },
        1 => {
            if UK_COUNTIES.contains(remaining[0].as_str()) {
                PlaceTriple {
                    town: None,
                    county: Some(remaining[0].clone()),
                    country,
                }
            } else {
                PlaceTriple {
                    town: Some(remaining[0].clone()),
                    county: None,
                    country,
                }
            }
        }
        _ => {
            let maybe_county = &remaining[remaining.len() - 1];
            let county = UK_COUNTIES
                .contains(maybe_county.as_str())
                .then(|| maybe_county.clone());
            PlaceTriple {
                town: Some(remaining[0].clone()),
                county,
                country,
            }
        }
    }
}

/// Classify the finest granularity of geographic detail in `place`, via the
/// parsed (town, county, country) triple.
pub fn place_specificity(place: &str) -> Specificity {
    let place = sanitize_place(place);
    let triple = parse_triple(&place);
    if triple.town.is_some() {
        Specificity::Town
    } else if triple.county.is_some() {
        Specificity::County
    } else if triple.country.is_some() {
        Specificity::Country
    } else if !comma_tokens(&place).is_empty() {
        Specificity::Partial
    } else {
        Specificity::None
    }
}

/// Exact, case-insensitive district match.
pub fn districts_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// One district name contains the other (case-insensitive), short of exact
/// equality — e.g. `"Derby"` vs `"Derby Registration District"`.
pub fn district_contains(a: &str, b: &str) -> bool {
    if districts_equal(a, b) {
        return false;
    }
    let (la, lb) = (a.to_lowercase(), b.to_lowercase());
    !la.is_empty() && !lb.is_empty() && (la.contains(&lb) || lb.contains(&la))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cur = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = cur;
        }
    }
    row[b.len()]
}

/// Fuzzy district match used for the "district-similarity function" of
/// §4.4/§4.5/§4.6: true when the districts are close by edit distance but
/// not already an exact or containment match (those score higher tiers).
pub fn districts_similar(a: &str, b: &str) -> bool {
    if districts_equal(a, b) || district_contains(a, b) {
        return false;
    }
    let (la, lb) = (a.trim().to_lowercase(), b.trim().to_lowercase());
    if la.is_empty() || lb.is_empty() {
        return false;
    }
    levenshtein(&la, &lb) <= 2
}

/// The first comma-separated token of a place string (§4.1 district
/// extraction).
pub fn district_of(place: &str) -> Option<String> {
    let place = sanitize_place(place);
    place
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_non_latin_glosses() {
        let sanitized = sanitize_place("Derby, Россия");
        assert!(sanitized.contains("Russia"));
        assert!(!sanitized.chars().any(|c| !c.is_ascii()));
    }

    #[test]
    fn collapses_double_commas_and_whitespace() {
        assert_eq!(sanitize_place("Derby,,  England"), "Derby, England");
    }

    #[test]
    fn modernizes_old_english_county_spellings() {
        let sanitized = sanitize_place("Derby, Deorbyscir");
        assert!(sanitized.contains("Derbyshire"));
    }

    #[test]
    fn sanitation_is_a_fixed_point() {
        // R3
        let once = sanitize_place("Derby,,  Deorbyscir  , Россия");
        let twice = sanitize_place(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn district_is_first_comma_token() {
        assert_eq!(district_of("Derby, Derbyshire, England").as_deref(), Some("Derby"));
    }

    #[test]
    fn uk_and_non_uk_classification() {
        assert!(is_uk_place("Derby, Derbyshire, England"));
        assert!(!is_non_uk_place("Derby, Derbyshire, England"));
        assert!(is_non_uk_place("Boston, MA, United States"));
        // A non-UK country token alongside a UK indicator is not non-UK.
        assert!(!is_non_uk_place("London, England, United States Embassy District"));
    }

    #[test]
    fn state_code_only_counts_as_final_token() {
        assert!(is_non_uk_place("Springfield, MA"));
        assert!(!is_non_uk_place("MA, Springfield"));
    }

    #[test]
    fn specificity_reflexive_and_commutative_on_equal_strings() {
        // P8
        let place = "Derby, Derbyshire, England";
        assert_eq!(place_specificity(place), place_specificity(place));
        let same_specificity = |a: &str, b: &str| place_specificity(a) == place_specificity(b);
        assert!(same_specificity(place, place));
        assert_eq!(same_specificity(place, place), same_specificity(place, place));
    }

    #[test]
    fn district_comparison_tiers() {
        assert!(districts_equal("Derby", "derby"));
        assert!(district_contains("Derby", "Derby Registration District"));
        assert!(districts_similar("Derby", "Derbey"));
        assert!(!districts_similar("Derby", "Derby"));
        assert!(!districts_similar("Derby", "London"));
    }

    #[test]
    fn specificity_levels() {
        assert_eq!(place_specificity("Derby, Derbyshire, England"), Specificity::Town);
        assert_eq!(place_specificity("Derbyshire, England"), Specificity::County);
        assert_eq!(place_specificity("England"), Specificity::Country);
        assert_eq!(place_specificity(""), Specificity::None);
    }
}
