//! Inbound bearer token validation.
//!
//! Workflow per request:
//! 1. Decode the header and read `kid`
//! 2. Look `kid` up in the startup [`SigningKeySet`]
//! 3. Verify signature, expiry, audience and issuer
//!
//! Only asymmetric RSA algorithms are accepted, so a token cannot downgrade
//! verification to a shared-secret scheme.

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use thiserror::Error;

use super::jwks::SigningKeySet;
use super::{fingerprint, InboundToken};

const ACCEPTED_ALGORITHMS: &[Algorithm] = &[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("unknown signing key: {kid}")]
    UnknownSigningKey { kid: String },

    #[error("invalid credentials: {reason}")]
    InvalidCredentials { reason: String },
}

impl AuthError {
    fn invalid(reason: impl Into<String>) -> Self {
        AuthError::InvalidCredentials {
            reason: reason.into(),
        }
    }
}

/// Claims read from a verified inbound token.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundClaims {
    pub sub: String,
    pub iss: String,
    pub aud: serde_json::Value,
    pub exp: i64,
    pub nbf: Option<i64>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
    /// Directory object id of the user.
    pub oid: Option<String>,
    pub tid: Option<String>,
    /// Space-separated delegated scopes.
    pub scp: Option<String>,
}

/// A caller whose token passed validation, plus the raw token for the exchange.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: InboundClaims,
    pub token: InboundToken,
}

impl AuthenticatedUser {
    /// Human-readable identity for logs: username, then display name, then subject.
    pub fn label(&self) -> &str {
        self.claims
            .preferred_username
            .as_deref()
            .or(self.claims.name.as_deref())
            .unwrap_or(&self.claims.sub)
    }
}

pub struct TokenValidator {
    keys: SigningKeySet,
    issuer: String,
    audience: String,
}

impl TokenValidator {
    pub fn new(keys: SigningKeySet, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    pub fn keys(&self) -> &SigningKeySet {
        &self.keys
    }

    /// Verify `raw` and return the authenticated caller.
    pub fn validate(&self, raw: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(raw)
            .map_err(|e| AuthError::invalid(format!("malformed token: {}", e)))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid("token header has no key identifier"))?;

        let key = self
            .keys
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownSigningKey { kid: kid.clone() })?;

        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::invalid(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }
        if let Some(pinned) = key.algorithm {
            if pinned != header.alg {
                return Err(AuthError::invalid(format!(
                    "token algorithm {:?} does not match key algorithm {:?}",
                    header.alg, pinned
                )));
            }
        }

        let mut validation = Validation::new(header.alg);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.validate_nbf = true;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<InboundClaims>(raw, key.decoding_key(), &validation)
            .map_err(|e| AuthError::invalid(e.to_string()))?;

        tracing::debug!(
            sub = %data.claims.sub,
            kid = %kid,
            token = %fingerprint(raw),
            "Inbound token validated"
        );

        Ok(AuthenticatedUser {
            claims: data.claims,
            token: InboundToken::new(raw),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────
