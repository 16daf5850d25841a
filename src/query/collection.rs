//! Table logical name → Web API collection (entity set) name.
//!
//! Known tables come from the schema table. Anything else falls back to a
//! suffix rule, which is wrong for irregular names; Dataverse answers those
//! with 404 and the error reaches the caller unchanged.

use super::prompt::SCHEMA;

pub fn collection_for(logical_name: &str) -> String {
    SCHEMA
        .iter()
        .find(|entity| entity.logical_name.eq_ignore_ascii_case(logical_name))
        .map(|entity| entity.collection.to_string())
        .unwrap_or_else(|| pluralize(logical_name))
}

/// English-ish pluralisation used for tables outside the schema table.
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();

    if let Some(stem) = lower.strip_suffix('y') {
        let before = stem.chars().last();
        if matches!(before, Some(c) if !"aeiou".contains(c)) {
            return format!("{}ies", &name[..name.len() - 1]);
        }
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| lower.ends_with(suffix)) {
        return format!("{}es", name);
    }

    format!("{}s", name)
}
