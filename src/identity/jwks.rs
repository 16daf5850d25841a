//! Signing key discovery.
//!
//! The identity provider publishes its token-signing public keys as a JSON Web
//! Key Set. The set is fetched once at startup and kept for the life of the
//! process: there is no refresh, so a key rotated in after startup is reported
//! as an unknown signing key until the service restarts.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Context;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;

// ── Types ────────────────────────────────────────────────────

/// JSON Web Key Set as returned by the discovery endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// A single JSON Web Key (RSA fields only; other key types are skipped).
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: Option<String>,
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

/// A verified-usable public key, keyed by its identifier.
pub struct SigningKey {
    pub kid: String,
    /// Algorithm pinned by the key document, if it declares one.
    pub algorithm: Option<Algorithm>,
    key: DecodingKey,
}

impl SigningKey {
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

/// Process-wide, read-only map from key identifier to public key.
pub struct SigningKeySet {
    keys: HashMap<String, SigningKey>,
}

impl std::fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeySet")
            .field("kids", &self.key_ids())
            .finish()
    }
}

// ── Construction ─────────────────────────────────────────────

impl SigningKeySet {
    /// Build the set from a parsed key document.
    ///
    /// Keys without an identifier, non-RSA keys, encryption keys and keys
    /// whose modulus/exponent do not decode are skipped with a warning.
    pub fn from_jwks(jwks: Jwks) -> Self {
        let mut keys = HashMap::new();

        for jwk in jwks.keys {
            match signing_key_from_jwk(&jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), key);
                }
                Err(reason) => {
                    tracing::warn!(kid = ?jwk.kid, kty = %jwk.kty, "Skipping signing key: {}", reason);
                }
            }
        }

        Self { keys }
    }

    /// Fetch the key set from the identity provider's discovery endpoint.
    pub async fn fetch(http: &reqwest::Client, jwks_uri: &str) -> anyhow::Result<Self> {
        tracing::info!(jwks_uri = %jwks_uri, "Fetching signing keys");

        let resp = http
            .get(jwks_uri)
            .send()
            .await
            .context("signing key request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("signing key endpoint returned {}: {}", status, body);
        }

        let jwks: Jwks = resp.json().await.context("signing key document is not valid JSON")?;
        let set = Self::from_jwks(jwks);

        if set.is_empty() {
            anyhow::bail!("signing key endpoint returned no usable RSA signing keys");
        }

        tracing::info!(count = set.len(), kids = ?set.key_ids(), "Loaded signing keys");
        Ok(set)
    }

    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key identifiers, sorted for stable output.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn signing_key_from_jwk(jwk: &Jwk) -> Result<SigningKey, String> {
    let kid = jwk.kid.clone().ok_or("key has no kid")?;

    if jwk.kty != "RSA" {
        return Err(format!("unsupported key type {}", jwk.kty));
    }
    if let Some(key_use) = jwk.key_use.as_deref() {
        if key_use != "sig" {
            return Err(format!("key use is '{}', not 'sig'", key_use));
        }
    }

    let algorithm = match jwk.alg.as_deref() {
        Some(alg) => Some(Algorithm::from_str(alg).map_err(|_| format!("unknown algorithm {}", alg))?),
        None => None,
    };

    let n = jwk.n.as_deref().ok_or("rsa modulus missing")?;
    let e = jwk.e.as_deref().ok_or("rsa exponent missing")?;
    let key = DecodingKey::from_rsa_components(n, e)
        .map_err(|err| format!("failed to build rsa key: {}", err))?;

    Ok(SigningKey { kid, algorithm, key })
}

// ── Tests ────────────────────────────────────────────────────
