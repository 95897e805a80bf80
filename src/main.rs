use anyhow::{Context, Result};
use call_assist::{
    create_router, AppState, Config, HttpAssistGenerator, HttpMemoryStore, SessionRegistry,
    WsConnector,
};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "call-assist", about = "Call-assist session manager service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/call-assist")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);
    info!("ASR backend: {}", cfg.asr.endpoint);
    info!("Recordings: {}", cfg.recording.recordings_path);

    let connector = Arc::new(WsConnector::new(
        cfg.asr.endpoint.clone(),
        cfg.asr.api_key.clone(),
    ));
    let generator = Arc::new(HttpAssistGenerator::new(
        cfg.assist.generator_endpoint.clone(),
        cfg.assist.generator_api_key.clone(),
    ));
    let memory = Arc::new(HttpMemoryStore::new(
        cfg.memory.endpoint.clone(),
        cfg.memory.api_key.clone(),
    ));

    let registry = SessionRegistry::new(connector, generator, memory, cfg.registry_settings());

    let app = create_router(AppState::new(registry));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
