use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solar_core::{decode_event, decode_upload, normalize, Ingestor, ServerConfig, SqliteRepository};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod http;

#[derive(Debug, Parser)]
#[command(name = "solar-ingestd")]
#[command(about = "Solar monitor telemetry ingest server")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    #[arg(long, default_value = "./solar.db")]
    database: PathBuf,

    /// Prefix for all routes, e.g. `/api`.
    #[arg(long, default_value = "")]
    base_path: String,

    #[arg(long, default_value_t = 64 * 1024)]
    max_body_bytes: usize,

    /// Shared secret expected in the `X-Token` header.
    #[arg(long, env = "SOLAR_BACKEND_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    Serve,
    /// Decode a captured reading upload and print the normalized readings.
    DecodeUpload { path: PathBuf },
    /// Decode a captured system event and print its canonical form.
    DecodeEvent { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = ServerConfig {
        bind: cli.bind,
        database: cli.database,
        base_path: cli.base_path,
        max_body_bytes: cli.max_body_bytes,
        token: cli.token,
    };

    match cli.command {
        Command::Serve => serve(config).await?,
        Command::DecodeUpload { path } => {
            let bytes = read_payload(&path)?;
            let batch = decode_upload(&bytes)
                .with_context(|| format!("decoding upload {}", path.display()))?;
            let out = serde_json::json!({
                "start_timestamp": batch.start_timestamp,
                "entries": batch.entries.len(),
                "readings": normalize(&batch),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::DecodeEvent { path } => {
            let bytes = read_payload(&path)?;
            let event = decode_event(&bytes)
                .with_context(|| format!("decoding event {}", path.display()))?;
            println!("{}", event.render());
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> Result<()> {
    if config.token.as_deref().map_or(true, str::is_empty) {
        warn!("SOLAR_BACKEND_TOKEN not set, ingestion requests will fail with 500");
    }

    let repo = SqliteRepository::open(&config.database)
        .with_context(|| format!("opening database {}", config.database.display()))?;
    let ingestor = Ingestor::new(Arc::new(repo));
    let app = http::router(&config, ingestor);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, base_path = %config.base_path, "listening");

    axum::serve(listener, tower::make::Shared::new(app))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("received ctrl-c, stopping");
            }
        })
        .await
        .context("server error")?;

    Ok(())
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}
