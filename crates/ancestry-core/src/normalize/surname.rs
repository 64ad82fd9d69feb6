//! Surname variant generation (§4.1): mechanical transforms applied to a
//! surname to probe for historical spelling variants, used when a first-pass
//! civil-index search returns nothing (§4.4 Pass 3).

/// Mechanical substring transform pairs tried in both directions.
const TRANSFORMS: &[(&str, &str)] = &[
    ("son", "sen"),
    ("y", "ey"),
    ("th", "t"),
    ("ph", "f"),
    ("oo", "ou"),
];

fn swap_suffix(s: &str, from: &str, to: &str) -> Option<String> {
    s.to_lowercase()
        .strip_suffix(from)
        .map(|base| format!("{base}{to}"))
}

fn with_case_of(template: &str, lower_candidate: &str) -> String {
    if template.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = lower_candidate.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    } else {
        lower_candidate.to_string()
    }
}

/// Generate surname variants via mechanical transforms: mac↔mc, a trailing
/// silent `e`, and suffix swaps (son↔sen, y↔ey, th↔t, ph↔f, oo↔ou). Filters
/// out anything of length ≤ 2 and dedupes.
pub fn surname_variants(surname: &str) -> Vec<String> {
    let lower = surname.to_lowercase();
    let mut variants: Vec<String> = Vec::new();

    if let Some(rest) = lower.strip_prefix("mac") {
        variants.push(with_case_of(surname, &format!("mc{rest}")));
    } else if let Some(rest) = lower.strip_prefix("mc") {
        variants.push(with_case_of(surname, &format!("mac{rest}")));
    }

    if let Some(stripped) = lower.strip_suffix('e') {
        variants.push(with_case_of(surname, stripped));
    } else {
        variants.push(with_case_of(surname, &format!("{lower}e")));
    }

    for (from, to) in TRANSFORMS {
        if let Some(swapped) = swap_suffix(&lower, from, to) {
            variants.push(with_case_of(surname, &swapped));
        }
        if let Some(swapped) = swap_suffix(&lower, to, from) {
            variants.push(with_case_of(surname, &swapped));
        }
    }

    variants.retain(|v| v.len() > 2 && v.to_lowercase() != lower);
    variants.sort();
    variants.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_mc_transform_is_bidirectional() {
        assert!(surname_variants("MacDonald").iter().any(|v| v.eq_ignore_ascii_case("McDonald")));
        assert!(surname_variants("McDonald").iter().any(|v| v.eq_ignore_ascii_case("MacDonald")));
    }

    #[test]
    fn trailing_e_is_toggled() {
        assert!(surname_variants("Smythe").iter().any(|v| v.eq_ignore_ascii_case("Smyth")));
        assert!(surname_variants("Smyth").iter().any(|v| v.eq_ignore_ascii_case("Smythe")));
    }

    #[test]
    fn son_sen_transform() {
        assert!(surname_variants("Johnson").iter().any(|v| v.eq_ignore_ascii_case("Johnsen")));
    }

    #[test]
    fn no_duplicate_or_short_variants() {
        let variants = surname_variants("Lee");
        assert!(variants.iter().all(|v| v.len() > 2));
        let mut sorted = variants.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(variants.len(), sorted.len());
    }
}
