use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reqflow::config::Config;
use reqflow::llm::ModelRegistry;
use reqflow::mcp::{ProviderConnector, TransportRegistry};
use reqflow::server::{build_app, AppState};
use reqflow::session::{FileSessionStore, SessionResolver, SessionStore};

// ============================================================================
// CLI Types
// ============================================================================

/// Reqflow - a streaming orchestrator for conversational tool use
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "reqflow.yaml")]
        config: String,

        /// Host to bind to (overrides config file)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => serve(&config, host, port).await,
    }
}

async fn serve(config_path: &str, host: Option<IpAddr>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load(config_path)
        .await
        .with_context(|| format!("loading config from '{config_path}'"))?;

    if let Some(host) = host {
        config.server.host = host.to_string();
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if config.models.is_empty() {
        info!("no models configured; /readyz will report unavailable");
    }

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(
        config.store.sessions_dir.clone(),
        Duration::from_secs(config.store.ttl_seconds),
    ));
    let transports = TransportRegistry::new();
    let connector = Arc::new(ProviderConnector::new(reqwest::Client::new()));
    let resolver = SessionResolver::new(
        store.clone(),
        transports,
        connector,
        config.turn.reconnect_attempts,
    );
    let models = ModelRegistry::new(config.models.clone());

    let state = AppState {
        store,
        resolver,
        models,
        keep_alive_interval_seconds: config.server.keep_alive_interval_seconds,
        turn_timeout_seconds: config.turn.turn_timeout_seconds,
        max_connections: config.server.max_connections,
        max_body_bytes: config.server.max_body_bytes,
    };
    let app = build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid bind host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("server stopped");
    Ok(())
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
