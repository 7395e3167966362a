//! SynergyAI agent backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use synergy_agent::config::{Args, LogFormat};
use synergy_agent::{server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("synergy_agent={},info", log_level).into()),
    );
    match args.log_format {
        LogFormat::Json => subscriber.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => subscriber.with(tracing_subscriber::fmt::layer()).init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  SynergyAI Agent Backend v{}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Public URL: {}", args.public_url());
    info!("RPC: {}", args.rpc_url.as_deref().unwrap_or("-"));
    info!("Registry: {}", args.registry_address().unwrap_or("not configured"));
    info!("Router: {}", args.sushi_router_address);
    info!("Verifier DID: {}", args.privado_verifier_did);
    info!("Circuits: {}", args.circuits_dir.display());
    info!("======================================");

    let state = match AppState::new(args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    server::run(state).await?;
    Ok(())
}
