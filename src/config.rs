use anyhow::Context;
use zeroize::Zeroizing;

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_DATAVERSE_API_VERSION: &str = "v9.2";
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_PORT: u16 = 8000;

pub struct Config {
    pub port: u16,
    /// Entra ID directory (tenant) identifier.
    pub tenant_id: String,
    /// Base URL of the identity provider, without the tenant segment.
    pub authority_host: String,
    /// This service's registered client identifier.
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    /// Expected `iss` claim of inbound tokens.
    pub token_issuer: String,
    /// Expected `aud` claim of inbound tokens.
    pub token_audience: String,
    /// Scope requested during the on-behalf-of exchange.
    pub dataverse_scope: String,
    pub dataverse_url: String,
    pub dataverse_api_version: String,
    pub openai_api_key: Zeroizing<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Origin of the single-page frontend allowed through CORS.
    pub allowed_origin: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("tenant_id", &self.tenant_id)
            .field("authority_host", &self.authority_host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_issuer", &self.token_issuer)
            .field("token_audience", &self.token_audience)
            .field("dataverse_scope", &self.dataverse_scope)
            .field("dataverse_url", &self.dataverse_url)
            .field("dataverse_api_version", &self.dataverse_api_version)
            .field("openai_api_key", &"<redacted>")
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("allowed_origin", &self.allowed_origin)
            .finish()
    }
}

/// Identity provider location: enough to list signing keys without the rest
/// of the configuration.
#[derive(Debug, Clone)]
pub struct Authority {
    pub host: String,
    pub tenant_id: String,
}

impl Authority {
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Authority>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let tenant_id = get("AZURE_TENANT_ID")
            .context("required environment variable AZURE_TENANT_ID is not set")?;
        let host = get("AZURE_AUTHORITY_HOST")
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.into())
            .trim_end_matches('/')
            .to_string();
        Ok(Authority { host, tenant_id })
    }

    /// Signing-key discovery endpoint for the tenant.
    pub fn jwks_uri(&self) -> String {
        format!("{}/{}/discovery/v2.0/keys", self.host, self.tenant_id)
    }

    /// Token-issuance endpoint used for the on-behalf-of exchange.
    pub fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.host, self.tenant_id)
    }
}

impl Config {
    pub fn authority(&self) -> Authority {
        Authority {
            host: self.authority_host.clone(),
            tenant_id: self.tenant_id.clone(),
        }
    }

    pub fn jwks_uri(&self) -> String {
        self.authority().jwks_uri()
    }

    pub fn token_endpoint(&self) -> String {
        self.authority().token_endpoint()
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// `load()` passes the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            get(name).with_context(|| format!("required environment variable {} is not set", name))
        };

        let Authority {
            host: authority_host,
            tenant_id,
        } = Authority::from_lookup(&lookup)?;
        let client_id = required("AZURE_CLIENT_ID")?;
        let client_secret = Zeroizing::new(required("AZURE_CLIENT_SECRET")?);
        let openai_api_key = Zeroizing::new(required("OPENAI_API_KEY")?);

        let dataverse_url = required("DATAVERSE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&dataverse_url)
            .with_context(|| format!("DATAVERSE_URL is not a valid URL: {}", dataverse_url))?;

        let token_issuer = get("COPILOT_TOKEN_ISSUER")
            .unwrap_or_else(|| format!("{}/{}/v2.0", authority_host, tenant_id));
        let token_audience = get("COPILOT_TOKEN_AUDIENCE").unwrap_or_else(|| client_id.clone());
        let dataverse_scope = get("DATAVERSE_SCOPE")
            .unwrap_or_else(|| format!("{}/user_impersonation", dataverse_url));

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            port,
            tenant_id,
            authority_host,
            client_id,
            client_secret,
            token_issuer,
            token_audience,
            dataverse_scope,
            dataverse_url,
            dataverse_api_version: get("DATAVERSE_API_VERSION")
                .unwrap_or_else(|| DEFAULT_DATAVERSE_API_VERSION.into()),
            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            allowed_origin: get("COPILOT_ALLOWED_ORIGIN")
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.into()),
        })
    }
}

/// Merge an optional `.env` file into the process environment.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

pub fn load() -> anyhow::Result<Config> {
    load_dotenv();
    Config::from_lookup(|name| std::env::var(name).ok())
}

pub fn load_authority() -> anyhow::Result<Authority> {
    load_dotenv();
    Authority::from_lookup(|name| std::env::var(name).ok())
}
