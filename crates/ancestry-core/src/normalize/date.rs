//! Date parsing (§4.1). Deterministic, side-effect-free.
//!
//! Accepted forms, tried in order: year-only `YYYY`; `DD.MM.YY` with a
//! two-digit-year pivot (`> 25` ⇒ 1900s, else 2000s); `DD.MM.YYYY`; an
//! optional day followed by a month name (full or abbreviated) and a year,
//! e.g. `"3 January 1950"` or `"Jan 1950"`. Leading modifiers
//! `abt|about|circa|c.|~` are stripped before matching.

use crate::model::NormalizedDate;
use once_cell::sync::Lazy;
use regex::Regex;

static MODIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(abt\.?|about|circa|c\.|~)\s*").unwrap());
static YEAR_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").unwrap());
static DOTTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{2}|\d{4})$").unwrap());
static MONTH_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\d{1,2})\s+)?([A-Za-z]+)\s+(\d{4})$").unwrap());

const MONTHS: &[(&str, &str, u32)] = &[
    ("january", "jan", 1),
    ("february", "feb", 2),
    ("march", "mar", 3),
    ("april", "apr", 4),
    ("may", "may", 5),
    ("june", "jun", 6),
    ("july", "jul", 7),
    ("august", "aug", 8),
    ("september", "sep", 9),
    ("october", "oct", 10),
    ("november", "nov", 11),
    ("december", "dec", 12),
];

fn month_number(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    MONTHS
        .iter()
        .find(|(full, abbr, _)| *full == lower || *abbr == lower)
        .map(|(_, _, n)| *n)
}

fn pivot_two_digit_year(yy: i32) -> i32 {
    if yy > 25 {
        1900 + yy
    } else {
        2000 + yy
    }
}

/// Parse a free-text date into its structured form, or `None` if it matches
/// none of the accepted shapes.
pub fn parse_date(input: &str) -> Option<NormalizedDate> {
    let trimmed = input.trim();
    let stripped = MODIFIER_RE.replace(trimmed, "");
    let s = stripped.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = YEAR_ONLY_RE.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        return Some(NormalizedDate::year_only(year));
    }

    if let Some(caps) = DOTTED_RE.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
            return None;
        }
        let year_token = &caps[3];
        let year = if year_token.len() == 2 {
            pivot_two_digit_year(year_token.parse().ok()?)
        } else {
            year_token.parse().ok()?
        };
        return Some(NormalizedDate {
            year,
            month: Some(month),
            day: Some(day),
        });
    }

    if let Some(caps) = MONTH_NAME_RE.captures(s) {
        let day = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let month = month_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        return Some(NormalizedDate {
            year,
            month: Some(month),
            day,
        });
    }

    None
}
