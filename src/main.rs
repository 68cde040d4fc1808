//! docgate server binary
//!
//! ```bash
//! # Defaults: 0.0.0.0:5000, files under ./data
//! docgate
//!
//! # Explicit config file and overrides
//! docgate --config config.toml --port 8080 --data-dir /var/lib/docgate
//!
//! curl -F file=@report.csv http://localhost:5000/upload
//! curl http://localhost:5000/files
//! curl http://localhost:5000/files/report.md
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use docgate_convert::ConverterGateway;
use docgate_core::{DConfig, LogFormat};
use docgate_server::{RouterOptions, create_router};
use docgate_storage::FileSystemStorage;
use docgate_telemetry::{TelemetryOptions, init_telemetry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Document upload and Markdown conversion gateway
#[derive(Debug, Parser)]
#[command(name = "docgate", version, about)]
struct Cli {
    /// Path to config.toml (searched in the current directory and parents otherwise)
    #[arg(short, long, env = "DOCGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Parent of the uploads/ and converted/ directories, overrides `storage.data_dir`
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    init_telemetry(&TelemetryOptions {
        service_name: config.observability.service_name.clone(),
        json: config.observability.log_format == LogFormat::Json,
    })
    .context("Failed to initialize telemetry")?;

    let storage = FileSystemStorage::from_config(&config.storage);
    storage
        .init()
        .await
        .context("Failed to create storage directories")?;
    tracing::info!(
        upload_dir = %config.storage.upload_dir().display(),
        converted_dir = %config.storage.converted_dir().display(),
        "Storage ready"
    );

    let gateway = ConverterGateway::from_config(&config.converter);
    if gateway.registry().is_empty() {
        tracing::warn!("No converters configured; uploads will be stored without artifacts");
    }

    let app = create_router(
        Arc::new(storage),
        Arc::new(gateway),
        RouterOptions {
            max_upload_bytes: config.server.max_upload_bytes,
        },
    );

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "docgate listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server failed")?;

    tracing::info!("docgate stopped");
    Ok(())
}

/// Config file (explicit or discovered), then CLI overrides
fn load_config(cli: &Cli) -> Result<DConfig> {
    let mut config = match cli.config {
        Some(ref path) => DConfig::load_from(Some(path.as_path()))
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => DConfig::load().context("Failed to load configuration")?,
    };

    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    config.validate().context("Invalid command-line override")?;

    Ok(config)
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        }
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
    }
}
