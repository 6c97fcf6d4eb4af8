use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use voice_screening::{create_router, logging, AppState, Config, MemoryStore, NatsProviderFactory, SystemClock};

#[derive(Debug, Parser)]
#[command(name = "voice-screening", about = "Voice screening interview service")]
struct Cli {
    /// Config file path (extension optional)
    #[arg(long, default_value = "config/voice-screening")]
    config: String,

    /// Override the bind address from the config
    #[arg(long)]
    bind: Option<String>,

    /// Override the port from the config
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Voice Screening v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    if cfg.provider.public_key.is_none() || cfg.provider.assistant_id.is_none() {
        warn!("Voice provider identifiers are not configured; interviews will fail to initialize");
    }

    let providers = Arc::new(NatsProviderFactory {
        url: cfg.provider.nats_url.clone(),
        event_buffer: cfg.session.event_buffer,
    });

    let state = AppState::new(
        providers,
        cfg.provider.clone(),
        cfg.session.clone(),
        Arc::new(MemoryStore::default()),
        Arc::new(SystemClock),
    );

    let bind = cli.bind.unwrap_or(cfg.service.http.bind);
    let port = cli.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}
