//! On-behalf-of token exchange.
//!
//! The service authenticates to the identity provider as a confidential
//! client and trades the caller's token (the user assertion) for an access
//! token scoped to Dataverse. The exchanged token is never cached: every
//! request performs its own exchange.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use super::{fingerprint, InboundToken};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("identity provider rejected the exchange (HTTP {status}): {code}: {description}")]
    Rejected {
        status: u16,
        code: String,
        description: String,
        correlation_id: Option<String>,
    },

    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned an unreadable response (HTTP {status}): {detail}")]
    MalformedResponse { status: u16, detail: String },
}

/// Pre-provisioned service identity, built once at startup.
pub struct ConfidentialClient {
    client_id: String,
    client_secret: Zeroizing<String>,
    token_endpoint: String,
}

impl ConfidentialClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Zeroizing<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            token_endpoint: token_endpoint.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl std::fmt::Debug for ConfidentialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidentialClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_endpoint", &self.token_endpoint)
            .finish()
    }
}

/// Access token for Dataverse, bound to the calling user.
pub struct ExchangedToken {
    access_token: Zeroizing<String>,
    pub token_type: String,
    /// Reported by the identity provider; informational only.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ExchangedToken {
    pub fn expose(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for ExchangedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangedToken")
            .field("access_token", &fingerprint(&self.access_token))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl std::fmt::Display for ExchangedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&fingerprint(&self.access_token))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
    correlation_id: Option<String>,
}

pub struct TokenExchanger {
    client: ConfidentialClient,
    scope: String,
    http: reqwest::Client,
}

impl TokenExchanger {
    pub fn new(client: ConfidentialClient, scope: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            client,
            scope: scope.into(),
            http,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Trade the caller's token for a downstream-scoped access token.
    pub async fn exchange(&self, user: &InboundToken) -> Result<ExchangedToken, ExchangeError> {
        let form = [
            ("grant_type", JWT_BEARER_GRANT),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("assertion", user.expose()),
            ("scope", self.scope.as_str()),
            ("requested_token_use", "on_behalf_of"),
        ];

        let resp = self
            .http
            .post(&self.client.token_endpoint)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => ExchangeError::Rejected {
                    status: status.as_u16(),
                    code: err.error,
                    description: err.error_description.unwrap_or_default(),
                    correlation_id: err.correlation_id,
                },
                Err(_) => ExchangeError::MalformedResponse {
                    status: status.as_u16(),
                    detail: body.chars().take(200).collect(),
                },
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ExchangeError::MalformedResponse {
                status: status.as_u16(),
                detail: e.to_string(),
            })?;

        let token = ExchangedToken {
            access_token: Zeroizing::new(parsed.access_token),
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: parsed
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        };

        tracing::debug!(scope = %self.scope, token = %token, "On-behalf-of exchange succeeded");
        Ok(token)
    }
}

// ── Tests ────────────────────────────────────────────────────
