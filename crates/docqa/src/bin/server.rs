//! docqa server binary
//!
//! Run with: cargo run -p docqa --bin docqa-server -- --config docqa.toml

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docqa::{config::RagConfig, pipeline::Pipeline, server::RagServer};

#[derive(Parser)]
#[command(name = "docqa-server")]
#[command(about = "Question answering over a private document corpus", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Start without building the index; call POST /reindex later
    #[arg(long)]
    no_initial_index: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RagConfig::load(path)?,
        None => {
            let config = RagConfig::default();
            config.validate()?;
            config
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Chunk size: {} (overlap {}, max {} per document)",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        config.chunking.max_chunks
    );
    tracing::info!("  - Top k: {}", config.retrieval.top_k_results);

    let pipeline = Arc::new(Pipeline::from_config(&config).await?);

    if args.no_initial_index {
        tracing::info!("Initial index build skipped; POST /reindex to build");
    } else {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = pipeline.build_index().await {
                tracing::error!("Initial index build failed: {}", e);
            }
        });
    }

    let server = RagServer::new(config.server.clone(), pipeline);

    tracing::info!("  API: http://{}", server.address());
    tracing::info!("  POST /ask      - Ask a question");
    tracing::info!("  POST /reindex  - Rebuild the index");
    tracing::info!("  GET  /status   - Pipeline status");

    server.start().await?;

    Ok(())
}
