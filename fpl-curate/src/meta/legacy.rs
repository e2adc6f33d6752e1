//! Legacy `meta.txt` parser
//!
//! One `Field Name: value` pair per line. Field names are matched exactly
//! against a fixed table; anything else is ignored. When a field repeats,
//! the first occurrence wins.

use super::{CurationMeta, MetaField};

/// Display field name → canonical field
const LEGACY_FIELDS: &[(&str, MetaField)] = &[
    ("Title", MetaField::Title),
    ("Series", MetaField::Series),
    ("Developer", MetaField::Developer),
    ("Publisher", MetaField::Publisher),
    ("Status", MetaField::Status),
    ("Extreme", MetaField::Extreme),
    ("Genre", MetaField::Tags),
    ("Source", MetaField::Source),
    ("Launch Command", MetaField::LaunchCommand),
    ("Notes", MetaField::Notes),
    ("Author Notes", MetaField::CurationNotes),
];

/// Look up the canonical field for a legacy display name
pub fn legacy_field(name: &str) -> Option<MetaField> {
    LEGACY_FIELDS
        .iter()
        .find(|(display, _)| *display == name)
        .map(|(_, field)| *field)
}

/// Parse legacy meta text
///
/// Infallible: malformed lines are skipped. The value is everything after
/// the first `:` with leading whitespace removed.
pub fn parse_legacy_meta(text: &str) -> CurationMeta {
    let mut meta = CurationMeta::new();
    // Fields already seen, including ones whose value was empty
    let mut seen: Vec<MetaField> = Vec::new();

    for line in text.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let Some(field) = legacy_field(name) else {
            continue;
        };
        if seen.contains(&field) {
            continue;
        }
        seen.push(field);
        meta.set_field(field, value.trim_start());
    }

    meta
}
