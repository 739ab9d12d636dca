use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use mend_engine::SessionOrchestrator;
use mend_server::ServerConfig;
use mend_settings::MendSettings;
use mend_telemetry::TelemetryConfig;

/// Heart Mend: breakup recovery studio server.
#[derive(Debug, Parser)]
#[command(name = "mend", version, about)]
struct Args {
    /// Address to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on; 0 picks a free port.
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default: ~/.mend/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Default log level, e.g. `debug`. RUST_LOG still wins.
    #[arg(long)]
    log_level: Option<String>,

    /// Human-readable logs instead of JSON lines.
    #[arg(long)]
    pretty_logs: bool,
}

fn load(args: &Args) -> anyhow::Result<MendSettings> {
    let mut settings = match &args.settings {
        Some(path) => mend_settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => mend_settings::load_settings().context("loading settings")?,
    };
    if let Some(host) = &args.host {
        settings.server.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }
    if args.pretty_logs {
        settings.logging.json = false;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = load(&args)?;

    mend_telemetry::init_telemetry(&TelemetryConfig::from(&settings.logging))
        .context("initializing logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %settings.api.model,
        web_search = settings.search.enabled,
        staging_dir = %settings.staging.resolved_dir().display(),
        credential_configured = settings.api.api_key.is_some(),
        "starting Heart Mend"
    );

    let orchestrator = Arc::new(SessionOrchestrator::from_settings(&settings));
    let handle = mend_server::start(ServerConfig::from_settings(&settings), orchestrator)
        .await
        .with_context(|| {
            format!(
                "binding {}:{}",
                settings.server.host, settings.server.port
            )
        })?;

    tracing::info!(
        url = %format!("http://{}:{}/", settings.server.host, handle.port),
        "Heart Mend ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
