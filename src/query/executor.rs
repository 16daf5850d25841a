//! FetchXML execution against the Dataverse Web API.
//!
//! `GET {org}/api/data/{version}/{collection}?fetchXml=...` with the exchanged
//! token. Only the first page of the response is read; a `@odata.nextLink` is
//! noted but never followed.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::collection::collection_for;
use super::StructuredQuery;
use crate::identity::exchange::ExchangedToken;

/// One row: column name → value, in the order Dataverse returned them.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub records: Vec<Record>,
    /// Dataverse reported further pages that were not fetched.
    pub has_more: bool,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("query does not name an entity to read from")]
    MissingSubject,

    #[error("Dataverse request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Dataverse returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Dataverse response was not a record collection: {0}")]
    MalformedEnvelope(String),
}

impl ExecutionError {
    /// Status code Dataverse answered with, when it answered at all.
    pub fn downstream_status(&self) -> Option<u16> {
        match self {
            ExecutionError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ODataEnvelope {
    value: Vec<Record>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

pub struct QueryExecutor {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl QueryExecutor {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_version: api_version.into(),
        }
    }

    /// Collection URL the query will be sent to.
    pub fn collection_url(&self, query: &StructuredQuery) -> Result<String, ExecutionError> {
        let subject = query.subject().ok_or(ExecutionError::MissingSubject)?;
        Ok(format!(
            "{}/api/data/{}/{}",
            self.base_url,
            self.api_version,
            collection_for(subject)
        ))
    }

    pub async fn execute(
        &self,
        query: &StructuredQuery,
        token: &ExchangedToken,
    ) -> Result<ResultSet, ExecutionError> {
        let url = self.collection_url(query)?;

        let resp = self
            .http
            .get(&url)
            .query(&[("fetchXml", query.as_str())])
            .bearer_auth(token.expose())
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Prefer", "odata.include-annotations=\"*\"")
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ExecutionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ODataEnvelope =
            serde_json::from_str(&body).map_err(|e| ExecutionError::MalformedEnvelope(e.to_string()))?;

        let has_more = envelope.next_link.is_some();
        if has_more {
            tracing::debug!(url = %url, "Dataverse reported more pages; only the first is used");
        }

        tracing::debug!(url = %url, records = envelope.value.len(), "Query executed");
        Ok(ResultSet {
            records: envelope.value,
            has_more,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────
