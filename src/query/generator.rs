//! Query generation through an OpenAI-compatible chat completion endpoint.
//!
//! One request per user message, `temperature: 0`. The model is still not
//! deterministic, so whatever comes back is treated as untrusted text: the
//! only processing is pulling the first ```fetchxml block out of the reply.
//!
//! Failures are returned as [`GeneratedQuery::Failed`] instead of an error so
//! the request still ends in a normal reply that explains what went wrong.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use super::prompt::{system_instruction, FENCE_CLOSE, FENCE_OPEN};
use super::StructuredQuery;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("the language model could not be reached ({0})")]
    Transport(String),

    #[error("the language model returned HTTP {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("the language model response was not a chat completion ({0})")]
    MalformedCompletion(String),

    #[error("the language model reply did not contain a fetchxml block")]
    MissingFence,

    #[error("the language model returned an empty fetchxml block")]
    EmptyQuery,
}

/// Outcome of the generation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedQuery {
    Ready(StructuredQuery),
    Failed(GenerationFailure),
}

// ── Wire types ───────────────────────────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── Extraction ───────────────────────────────────────────────

/// Pull the first ```fetchxml fenced block out of a model reply.
pub fn extract_query(reply: &str) -> Result<StructuredQuery, GenerationFailure> {
    let start = reply.find(FENCE_OPEN).ok_or(GenerationFailure::MissingFence)? + FENCE_OPEN.len();
    let rest = &reply[start..];
    let end = rest.find(FENCE_CLOSE).ok_or(GenerationFailure::MissingFence)?;

    let body = rest[..end].trim();
    if body.is_empty() {
        return Err(GenerationFailure::EmptyQuery);
    }
    Ok(StructuredQuery::new(body))
}

// ── Client ───────────────────────────────────────────────────

pub struct QueryGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: Zeroizing<String>,
    model: String,
}

impl QueryGenerator {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Zeroizing<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Translate `message` into a FetchXML query.
    pub async fn generate(&self, message: &str) -> GeneratedQuery {
        let outcome = match self.complete(message).await {
            Ok(reply) => extract_query(&reply),
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(query) => {
                tracing::debug!(model = %self.model, subject = ?query.subject(), "Generated query");
                GeneratedQuery::Ready(query)
            }
            Err(failure) => {
                tracing::warn!(model = %self.model, "Query generation failed: {}", failure);
                GeneratedQuery::Failed(failure)
            }
        }
    }

    async fn complete(&self, message: &str) -> Result<String, GenerationFailure> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_instruction(),
                },
                ChatMessage {
                    role: "user",
                    content: message,
                },
            ],
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationFailure::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationFailure::ProviderStatus {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let completion: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| GenerationFailure::MalformedCompletion(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationFailure::MalformedCompletion("no message content".to_string()))
    }
}

// ── Tests ────────────────────────────────────────────────────
