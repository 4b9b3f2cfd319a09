//! Mention table fixtures shared by the integration tests

use impress_resolve::{NameRecord, Normalizer, Row};

/// Build a row from `(column, value)` pairs.
pub fn row(pairs: &[(&str, Option<&str>)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.map(str::to_string)))
        .collect()
}

/// Rows with a `name` and a `nationality` column.
pub fn mention_rows(mentions: &[(&str, Option<&str>)]) -> Vec<Row> {
    mentions
        .iter()
        .map(|(name, nationality)| row(&[("name", Some(*name)), ("nationality", *nationality)]))
        .collect()
}

/// Records without attributes, normalized with no token lookup.
#[allow(dead_code)]
pub fn bare_records(names: &[&str]) -> Vec<NameRecord> {
    let normalizer = Normalizer::default();
    names
        .iter()
        .enumerate()
        .map(|(index, name)| NameRecord::new(index, *name, &normalizer))
        .collect()
}

/// A small table of historical figures and places, some sharing names
/// across nationalities and some lacking a nationality.
#[allow(dead_code)]
pub fn historical_mentions() -> Vec<Row> {
    mention_rows(&[
        ("Jan de Vries", Some("Dutch")),
        ("J. de Vries", Some("Dutch")),
        ("Jan de Vries", Some("German")),
        ("Willem van Oranje", Some("Dutch")),
        ("Willem van Oranje-Nassau", Some("Dutch")),
        ("Paris", Some("French")),
        ("Berlin", Some("German")),
        ("Jan de Vries", None),
        ("Rotterdam", None),
        ("Rotterdam", Some("")),
    ])
}
