//! Gateway server binary
//!
//! Run with: cargo run -p rag-gateway --bin rag-gateway-server -- --config gateway.toml

use clap::Parser;
use std::path::PathBuf;

use rag_gateway::{config::GatewayConfig, server::GatewayServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "rag-gateway-server", version, about = "Chat and upload gateway for a Vertex AI RAG corpus")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "RAG_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Initialize the model at startup instead of on the first request
    #[arg(long)]
    eager: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = GatewayConfig::load(args.config.as_deref())?;
    config.init.eager |= args.eager;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Project: {}", config.gcp.project_id);
    tracing::info!("  - Location: {}", config.gcp.location);
    tracing::info!("  - Corpus: {}", config.gcp.corpus_display_name);
    tracing::info!("  - Model: {}", config.gcp.model_name);
    tracing::info!("  - Bucket: {}", config.gcp.bucket());

    let server = GatewayServer::new(config)?;

    tracing::info!("Endpoints on http://{}:", server.address());
    tracing::info!("  GET  /        - Landing page");
    tracing::info!("  POST /chat    - Chat with the corpus");
    tracing::info!("  POST /upload  - Upload a document for ingestion");
    tracing::info!("  GET  /ready   - Model readiness");

    server.start().await?;

    Ok(())
}
