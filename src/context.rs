//! Process-wide, read-only state shared by every request.

use anyhow::Context as _;

use crate::config::Config;
use crate::identity::exchange::{ConfidentialClient, TokenExchanger};
use crate::identity::jwks::SigningKeySet;
use crate::identity::validator::TokenValidator;
use crate::metrics::PipelineMetrics;
use crate::query::executor::QueryExecutor;
use crate::query::generator::QueryGenerator;

/// Built once at startup and shared as `Arc<AppContext>`; never mutated.
pub struct AppContext {
    pub config: Config,
    pub validator: TokenValidator,
    pub exchanger: TokenExchanger,
    pub generator: QueryGenerator,
    pub executor: QueryExecutor,
    pub metrics: PipelineMetrics,
}

/// Shared outbound client. No request timeout is set: calls wait as long as
/// the remote side keeps the connection open.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(concat!("field-copilot/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

impl AppContext {
    /// Fetch the signing keys and assemble the context.
    pub async fn bootstrap(config: Config) -> anyhow::Result<Self> {
        let http = http_client()?;
        let keys = SigningKeySet::fetch(&http, &config.jwks_uri())
            .await
            .context("failed to load identity provider signing keys")?;
        Self::with_signing_keys(config, keys, http)
    }

    /// Assemble the context around an already obtained key set.
    pub fn with_signing_keys(
        config: Config,
        keys: SigningKeySet,
        http: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let validator = TokenValidator::new(
            keys,
            config.token_issuer.clone(),
            config.token_audience.clone(),
        );

        let client = ConfidentialClient::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.token_endpoint(),
        );
        let exchanger = TokenExchanger::new(client, config.dataverse_scope.clone(), http.clone());

        let generator = QueryGenerator::new(
            http.clone(),
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
        );

        let executor = QueryExecutor::new(
            http,
            config.dataverse_url.clone(),
            config.dataverse_api_version.clone(),
        );

        Ok(Self {
            config,
            validator,
            exchanger,
            generator,
            executor,
            metrics: PipelineMetrics::new()?,
        })
    }
}
