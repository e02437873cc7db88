use std::net::SocketAddr;
use std::sync::Arc;

use callfeed_directory::{DirectoryLookup, NoDirectory, SqliteDirectory};
use clap::Parser;
use tracing::{info, warn};

mod app;
mod auth;
mod http;

/// Call-event gateway: PBX webhook ingestion, history reads and a live SSE feed.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file (default: $CALLFEED_CONFIG, then ~/.callfeed/callfeed.toml)
    #[arg(long, short)]
    config: Option<String>,

    /// Override gateway.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "callfeed_gateway=info,callfeed_hub=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > CALLFEED_CONFIG env > ~/.callfeed/callfeed.toml
    let config_path = cli.config.or_else(|| std::env::var("CALLFEED_CONFIG").ok());
    let mut config = callfeed_core::CallfeedConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        callfeed_core::CallfeedConfig::default()
    });
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let directory = open_directory(config.directory.path.as_deref());
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let state = Arc::new(app::AppState::new(config, directory));
    // Surface open-ingestion mode at startup rather than on the first call.
    state.ingest_secret();
    let router = app::build_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Callfeed gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let state_for_shutdown = Arc::clone(&state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            // Open SSE streams would otherwise hold graceful shutdown forever.
            state_for_shutdown.calls.shutdown();
        })
        .await?;

    Ok(())
}

/// Contact directory for name enrichment. Failing to open it is not fatal;
/// history reads just go unenriched.
fn open_directory(path: Option<&str>) -> Arc<dyn DirectoryLookup> {
    let Some(path) = path else {
        info!("no directory.path configured; caller names come from webhooks only");
        return Arc::new(NoDirectory);
    };
    ensure_parent_dir(path);
    match SqliteDirectory::open(path) {
        Ok(dir) => {
            info!(path = %path, "contact directory opened");
            Arc::new(dir)
        }
        Err(e) => {
            warn!(path = %path, error = %e, "contact directory unavailable; continuing without it");
            Arc::new(NoDirectory)
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
