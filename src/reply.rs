//! Chat reply rendering.

use serde_json::Value;

use crate::query::executor::{Record, ResultSet};
use crate::query::generator::GenerationFailure;

pub const NO_RESULTS: &str = "I couldn't find any records matching your request.";
/// Tag that opens every reply produced from a failed generation stage.
pub const ERROR_TAG: &str = "[error]";
/// Records shown in full when a query returns several.
pub const MAX_RENDERED_RECORDS: usize = 3;
/// Marks OData annotation columns (`@odata.etag`, `statuscode@OData...`); never shown as columns.
const ANNOTATION_MARKER: char = '@';
/// Annotation carrying the display text of option sets, lookups and dates.
const FORMATTED_VALUE_SUFFIX: &str = "@OData.Community.Display.V1.FormattedValue";

/// Plain-text reply returned to the chat client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply(String);

impl ChatReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_error(&self) -> bool {
        self.0.starts_with(ERROR_TAG)
    }
}

impl std::fmt::Display for ChatReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn format_results(results: &ResultSet) -> ChatReply {
    let records = &results.records;

    let text = match records.len() {
        0 => NO_RESULTS.to_string(),
        1 => format!("I found one record:\n{}", render_record(&records[0])),
        n => {
            let mut text = format!("I found {} records.", n);
            if n > MAX_RENDERED_RECORDS {
                text.push_str(&format!(" Here are the first {}:", MAX_RENDERED_RECORDS));
            }
            for (i, record) in records.iter().take(MAX_RENDERED_RECORDS).enumerate() {
                text.push_str(&format!("\n\nRecord {}:\n{}", i + 1, render_record(record)));
            }
            text
        }
    };

    ChatReply(text)
}

pub fn generation_failed(failure: &GenerationFailure) -> ChatReply {
    ChatReply(format!(
        "{} I couldn't build a query for that request: {}. Try rephrasing your question.",
        ERROR_TAG, failure
    ))
}

fn render_record(record: &Record) -> String {
    record
        .iter()
        .filter(|(name, _)| !name.contains(ANNOTATION_MARKER))
        .map(|(name, value)| {
            let shown = record
                .get(&format!("{}{}", name, FORMATTED_VALUE_SUFFIX))
                .unwrap_or(value);
            format!("{}: {}", name, render_value(shown))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "(none)".to_string(),
        other => other.to_string(),
    }
}
