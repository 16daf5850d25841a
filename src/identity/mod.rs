//! Identity hops: inbound token validation and the on-behalf-of exchange.

pub mod exchange;
pub mod jwks;
pub mod validator;

/// Short, non-reversible rendering of a token for logs: first 8 chars and length.
pub fn fingerprint(token: &str) -> String {
    match token.get(..8) {
        Some(prefix) if token.len() > 16 => format!("{}…({} chars)", prefix, token.len()),
        _ => "****".to_string(),
    }
}

/// Raw bearer token presented by the caller.
///
/// Kept only for the lifetime of one request so it can be forwarded as the
/// user assertion of the exchange.
#[derive(Clone)]
pub struct InboundToken(String);

impl InboundToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for InboundToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InboundToken({})", fingerprint(&self.0))
    }
}
