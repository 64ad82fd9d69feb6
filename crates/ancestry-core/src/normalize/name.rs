//! Name parsing and similarity (§4.1). Deterministic, side-effect-free.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static NOT_FOUND_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\(not found\)\s*$").unwrap());

/// Result of splitting a full name into given name(s) and a surname.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameParts {
    pub given: String,
    pub surname: Option<String>,
}

/// Parse a full name: strip the `"(not found)"` suffix marker, split on
/// whitespace, surname is the final token, given name is the remainder.
/// A single token yields only a given name.
pub fn parse_name(input: &str) -> NameParts {
    let cleaned = NOT_FOUND_SUFFIX_RE.replace(input.trim(), "");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    match tokens.len() {
        0 => NameParts::default(),
        1 => NameParts {
            given: tokens[0].to_string(),
            surname: None,
        },
        _ => NameParts {
            given: tokens[..tokens.len() - 1].join(" "),
            surname: Some(tokens[tokens.len() - 1].to_string()),
        },
    }
}

/// Bidirectional canonical-name ↔ diminutives table.
static DIMINUTIVES: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        ("william", vec!["bill", "will", "wm", "billy"]),
        ("elizabeth", vec!["betty", "bess", "liz", "eliza", "libby", "beth", "betsy"]),
        ("robert", vec!["bob", "rob", "bobby", "robbie", "bert"]),
        ("richard", vec!["dick", "rick", "ricky", "richie"]),
        ("john", vec!["jack", "jon", "johnny", "jonny"]),
        ("james", vec!["jim", "jimmy", "jamie"]),
        ("margaret", vec!["maggie", "meg", "peggy", "margie", "rita"]),
        ("charles", vec!["charlie", "chuck", "chas"]),
        ("thomas", vec!["tom", "tommy"]),
        ("henry", vec!["harry", "hank"]),
        ("edward", vec!["ed", "eddie", "ted", "teddy", "ned"]),
        ("mary", vec!["molly", "polly", "mamie"]),
        ("catherine", vec!["kate", "katie", "cathy", "kitty", "kay"]),
        ("alexander", vec!["alex", "sandy", "xander"]),
        ("frances", vec!["fanny", "fran", "franny"]),
        ("dorothy", vec!["dot", "dolly", "dottie"]),
        ("samuel", vec!["sam", "sammy"]),
        ("george", vec!["geordie"]),
        ("ellen", vec!["nellie", "nell"]),
        ("sarah", vec!["sally"]),
        ("ann", vec!["annie", "nancy"]),
    ])
});

fn canonical_of(token: &str) -> String {
    let lower = token.to_lowercase();
    if DIMINUTIVES.contains_key(lower.as_str()) {
        return lower;
    }
    for (canonical, variants) in DIMINUTIVES.iter() {
        if variants.contains(&lower.as_str()) {
            return canonical.to_string();
        }
    }
    lower
}

fn first_token(s: &str) -> String {
    s.split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Case-insensitive name similarity: equal first tokens, diminutive
/// equivalence, or substring containment (to catch middle names).
pub fn names_similar(a: &str, b: &str) -> bool {
    let ta = first_token(a);
    let tb = first_token(b);
    if ta.is_empty() || tb.is_empty() {
        return false;
    }
    if ta == tb {
        return true;
    }
    if canonical_of(&ta) == canonical_of(&tb) {
        return true;
    }
    let a_tokens: Vec<String> = a.to_lowercase().split_whitespace().map(String::from).collect();
    let b_tokens: Vec<String> = b.to_lowercase().split_whitespace().map(String::from).collect();
    a_tokens.contains(&tb) || b_tokens.contains(&ta)
}

/// Weaker match than [`names_similar`]: one first token is a literal prefix
/// of the other (e.g. `"Eliz"` vs `"Elizabeth"`).
pub fn names_prefix_match(a: &str, b: &str) -> bool {
    let ta = first_token(a);
    let tb = first_token(b);
    if ta.is_empty() || tb.is_empty() || ta == tb {
        return false;
    }
    ta.starts_with(&tb) || tb.starts_with(&ta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_given_mid_surname() {
        // R1
        let parts = parse_name("Given Mid Surname");
        assert_eq!(parts.given, "Given Mid");
        assert_eq!(parts.surname, Some("Surname".to_string()));
    }

    #[test]
    fn singleton_yields_only_given_name() {
        let parts = parse_name("Madonna");
        assert_eq!(parts.given, "Madonna");
        assert_eq!(parts.surname, None);
    }

    #[test]
    fn strips_not_found_marker() {
        let parts = parse_name("John Smith (not found)");
        assert_eq!(parts.given, "John");
        assert_eq!(parts.surname, Some("Smith".to_string()));
    }

    #[test]
    fn diminutives_match_bidirectionally() {
        assert!(names_similar("William Smith", "Bill Smith"));
        assert!(names_similar("Bill Smith", "William Smith"));
        assert!(names_similar("Liz Jones", "Elizabeth Jones"));
    }

    #[test]
    fn unrelated_first_names_do_not_match() {
        assert!(!names_similar("William Smith", "Robert Smith"));
    }

    #[test]
    fn middle_name_containment_matches() {
        assert!(names_similar("John Robert Smith", "Robert Smith"));
    }

    #[test]
    fn prefix_match_is_weaker_than_similarity() {
        assert!(names_prefix_match("Eliz", "Elizabeth"));
        assert!(!names_similar("Eliz", "Elizabeth"));
    }
}
