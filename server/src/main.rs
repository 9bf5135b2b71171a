mod auth;
mod error;
mod routes;
mod state;

use anyhow::Context;
use bridge_config::ConfigManager;
use clap::Parser;
use state::AppState;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Backend for the voicemail and attachment mail-client plugin.
#[derive(Debug, Parser)]
#[command(name = "bridge-server", version, about)]
struct Cli {
    /// Configuration file; defaults to the platform config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.bind_addr` and `PORT`.
    #[arg(long)]
    bind: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    }
    .context("initialize config manager")?;
    let mut config = config_manager
        .load_runtime(|key| std::env::var(key).ok())
        .with_context(|| {
            format!(
                "load configuration from {}",
                config_manager.config_path().display()
            )
        })?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    tracing::info!(
        config_path = %config_manager.config_path().display(),
        bind_addr = %config.server.bind_addr,
        "configuration loaded"
    );

    let state = AppState::initialize(&config).context("initialize server state")?;
    routes::run(state, &config.server.bind_addr).await
}
