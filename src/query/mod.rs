//! Natural language → FetchXML → Dataverse records.

pub mod collection;
pub mod executor;
pub mod generator;
pub mod prompt;

use once_cell::sync::Lazy;
use regex::Regex;

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<entity\s+(?:[^>]*?\s)?name\s*=\s*["']([^"']+)["']"#).unwrap()
});

/// A FetchXML statement produced by the model.
///
/// Untrusted: nothing beyond fence extraction has been checked, so the
/// statement may be malformed or name an entity that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredQuery(String);

impl StructuredQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Logical name of the first `<entity>` element, i.e. the table queried.
    pub fn subject(&self) -> Option<&str> {
        ENTITY_RE
            .captures(&self.0)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl std::fmt::Display for StructuredQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
