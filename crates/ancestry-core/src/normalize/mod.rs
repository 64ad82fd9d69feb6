//! Normalizers (C1): deterministic, side-effect-free string functions for
//! dates, names, surnames and places. See spec §4.1.

pub mod date;
pub mod name;
pub mod place;
pub mod surname;

pub use date::parse_date;
pub use name::{names_prefix_match, names_similar, parse_name, NameParts};
pub use place::{
    district_contains, district_of, districts_equal, districts_similar, is_non_uk_place,
    is_uk_place, place_specificity, sanitize_place, Specificity,
};
pub use surname::surname_variants;
