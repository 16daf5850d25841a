use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use copilot::context::{http_client, AppContext};
use copilot::identity::jwks::SigningKeySet;
use copilot::pipeline::RequestId;
use copilot::{api, cli, config, pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG and OTEL_* may come from .env
    config::load_dotenv();
    init_tracing()?;

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(config::load()?, port).await,
        Some(cli::Commands::Ask { token, message }) => {
            run_ask(config::load()?, &token, &message).await
        }
        Some(cli::Commands::Keys) => list_keys(&config::load_authority()?).await,
        None => run_server(config::load()?, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Console logging, plus OTLP export when OTEL_EXPORTER_OTLP_ENDPOINT is set.
fn init_tracing() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "field-copilot"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "copilot=debug,fs_copilot=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    Ok(())
}

async fn run_server(cfg: config::Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);

    tracing::info!(tenant = %cfg.tenant_id, "Loading signing keys...");
    let ctx = Arc::new(AppContext::bootstrap(cfg).await?);

    tracing::info!(
        model = %ctx.generator.model(),
        dataverse = %ctx.config.dataverse_url,
        scope = %ctx.exchanger.scope(),
        "Pipeline ready"
    );

    let app = api::router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Field Service Copilot listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_ask(cfg: config::Config, token: &str, message: &str) -> anyhow::Result<()> {
    let ctx = AppContext::bootstrap(cfg).await?;
    let request_id = RequestId::new();
    tracing::debug!(request_id = %request_id, "Running one chat request");
    let reply = pipeline::handle_chat(&ctx, &request_id, token, message).await?;
    println!("{}", reply);
    Ok(())
}

async fn list_keys(authority: &config::Authority) -> anyhow::Result<()> {
    let keys = SigningKeySet::fetch(&http_client()?, &authority.jwks_uri()).await?;

    println!("{:<48} {:<10}", "KID", "ALG");
    for kid in keys.key_ids() {
        let alg = keys
            .get(kid)
            .and_then(|k| k.algorithm)
            .map(|a| format!("{:?}", a))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<48} {:<10}", kid, alg);
    }
    println!("\n{} key(s) from {}", keys.len(), authority.jwks_uri());
    Ok(())
}
