//! One chat message, end to end:
//! validate → exchange → generate → execute → format.
//!
//! Stages run strictly in order and every terminal failure returns before the
//! next network call is made. A failed generation is not terminal: it becomes
//! the reply and the Dataverse call is skipped.

use std::time::Instant;

use crate::context::AppContext;
use crate::errors::AppError;
use crate::identity::fingerprint;
use crate::query::generator::GeneratedQuery;
use crate::reply::{self, ChatReply};

/// Correlates one chat request across the response header and the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[tracing::instrument(
    name = "chat",
    skip_all,
    fields(request_id = %request_id, user = tracing::field::Empty)
)]
pub async fn handle_chat(
    ctx: &AppContext,
    request_id: &RequestId,
    bearer: &str,
    message: &str,
) -> Result<ChatReply, AppError> {
    let result = run_stages(ctx, bearer, message).await;

    let outcome = match &result {
        Ok(reply) if reply.is_error() => "generation_failed",
        Ok(_) => "answered",
        Err(e) => {
            ctx.metrics.record_failure(e.stage());
            "error"
        }
    };
    ctx.metrics.record_request(outcome);

    result
}

async fn run_stages(ctx: &AppContext, bearer: &str, message: &str) -> Result<ChatReply, AppError> {
    // -- 1. Validate inbound token --
    let started = Instant::now();
    let user = ctx.validator.validate(bearer).map_err(|e| {
        tracing::warn!(stage = "validate", token = %fingerprint(bearer), "Rejected inbound token: {}", e);
        e
    })?;
    ctx.metrics.observe_stage("validate", started.elapsed());

    let who = user.label().to_string();
    tracing::Span::current().record("user", who.as_str());

    // -- 2. On-behalf-of exchange --
    let started = Instant::now();
    let token = ctx.exchanger.exchange(&user.token).await.map_err(|e| {
        tracing::error!(stage = "exchange", user = %who, scope = %ctx.exchanger.scope(), "Token exchange failed: {}", e);
        e
    })?;
    ctx.metrics.observe_stage("exchange", started.elapsed());

    // -- 3. Natural language → FetchXML --
    let started = Instant::now();
    let generated = ctx.generator.generate(message).await;
    ctx.metrics.observe_stage("generate", started.elapsed());

    let query = match generated {
        GeneratedQuery::Ready(query) => query,
        GeneratedQuery::Failed(failure) => {
            tracing::warn!(stage = "generate", user = %who, "Answering with generation failure: {}", failure);
            ctx.metrics.record_failure("generate");
            return Ok(reply::generation_failed(&failure));
        }
    };

    // -- 4. Execute against Dataverse --
    let started = Instant::now();
    let results = ctx.executor.execute(&query, &token).await.map_err(|e| {
        tracing::error!(
            stage = "execute",
            user = %who,
            downstream_status = ?e.downstream_status(),
            subject = ?query.subject(),
            "Query execution failed: {}",
            e
        );
        e
    })?;
    ctx.metrics.observe_stage("execute", started.elapsed());

    // -- 5. Format --
    let reply = reply::format_results(&results);
    tracing::info!(
        user = %who,
        records = results.records.len(),
        has_more = results.has_more,
        "Chat request answered"
    );

    Ok(reply)
}
