//! people-search server binary

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use people_search::api::{create_router, AppState};
use people_search::bootstrap::bootstrap;
use people_search::cli::Cli;
use people_search::client::{ElasticClient, SearchBackend};
use people_search::config::{AppConfig, LogFormat};
use people_search::people::seed_people;
use people_search::server::serve;
use people_search::shutdown::{ShutdownCoordinator, ShutdownOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli).context("failed to load configuration")?;
    config.apply_cli(&cli);
    config.validate().context("invalid configuration")?;

    init_tracing(&config)?;

    let client = ElasticClient::new(&config.backend).context("failed to create backend client")?;
    tracing::info!(
        nodes = client.pool().nodes().len(),
        addresses = ?config.backend.addresses,
        "Backend client ready"
    );
    let backend: Arc<dyn SearchBackend> = Arc::new(client);

    bootstrap(backend.as_ref(), &config.bootstrap, &seed_people())
        .await
        .context("failed to bootstrap index")?;

    let state = AppState::new(backend, config.bootstrap.index.as_str());
    let router = create_router(state, &config.server);

    let addr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not listen on {}", addr))?;
    tracing::info!(
        %addr,
        read_timeout_secs = config.server.read_timeout_secs,
        write_timeout_secs = config.server.write_timeout_secs,
        idle_timeout_secs = config.server.idle_timeout_secs,
        shutdown_grace_secs = config.server.shutdown_grace_secs,
        "Server is ready to handle requests"
    );

    let shutdown = ShutdownCoordinator::new(config.server.shutdown_grace());
    match serve(listener, router, &config.server, &shutdown).await? {
        ShutdownOutcome::Graceful => tracing::info!("Server stopped"),
        ShutdownOutcome::Forced => tracing::warn!("Server stopped before all requests completed"),
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            AppConfig::load_from(path)
        }
        None => AppConfig::load(),
    }
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("people_search=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
