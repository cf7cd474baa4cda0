//! TabRefresh Server
//!
//! Serves the bulk extract refresh UI and its JSON API in front of a
//! Tableau-compatible REST API.
//!
//! Configuration is layered: file (YAML or TOML), then `TABREFRESH_*`
//! environment variables, then command-line flags.
//!
//! Usage:
//! ```bash
//! tabrefresh-server --config tabrefresh.yaml --port 8080
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tabrefresh_egress::tableau::TableauConnector;
use tabrefresh_observability::Metrics;
use tabrefresh_server::{ServerConfig, bind_listener, build_app, connector_config};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// TabRefresh Server - bulk extract refresh for Tableau workbooks
#[derive(Parser)]
#[command(name = "tabrefresh-server")]
#[command(about = "Web UI and API for bulk-refreshing Tableau workbook extracts", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "TABREFRESH_CONFIG")]
    config: Option<String>,

    /// Address to bind (overrides config and TABREFRESH_HOST)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to listen on (overrides config and TABREFRESH_PORT)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match cli.config {
        Some(ref path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => ServerConfig::default(),
    };

    // Environment overrides the file, CLI flags override both
    config.merge_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate()?;

    init_tracing(&config.logging.level)?;

    match cli.config {
        Some(ref path) => info!("Loaded configuration from {}", path),
        None => info!("Using default configuration"),
    }

    let connector = TableauConnector::new(connector_config(&config.upstream))
        .context("creating upstream client")?;
    info!(
        api_version = %config.upstream.api_version,
        request_timeout_secs = config.upstream.request_timeout_secs,
        refresh_timeout_secs = config.upstream.refresh_timeout_secs,
        refresh_concurrency = config.refresh.concurrency,
        "Upstream client ready"
    );

    let metrics = Arc::new(Metrics::new()?);
    let app = build_app(&config, Arc::new(connector), metrics);

    let listener = bind_listener(&config)
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    let addr = listener.local_addr()?;

    info!("TabRefresh listening on http://{}", addr);
    if config.ui.enabled {
        info!("  UI:            http://{}/", addr);
    } else {
        warn!("UI disabled; serving the JSON API only");
    }
    info!("  Health check:  http://{}/health", addr);
    info!("  Metrics:       http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("Warning: Invalid log level '{}' ({}), using info", level, e);
            EnvFilter::new("info")
        }),
    };

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
