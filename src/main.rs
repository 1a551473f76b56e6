use anyhow::{Context, Result};
use clap::Parser;
use herdlog::{
    AppState, AudioAssetStore, AudioDecoder, ChatAnalyzer, Config, InMemoryObservationRepository,
    PipelineOrchestrator, WhisperTranscriber,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "herdlog", about = "Audio-to-structured animal observation service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(short, long, default_value = "config/herdlog")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);
    info!("Scratch directory: {}", cfg.audio.scratch_dir);
    info!("Speech model: {}", cfg.speech.model_path);
    info!("Analysis endpoint: {}", cfg.analysis.endpoint);

    let store = Arc::new(AudioAssetStore::new(&cfg.audio)?);
    let decoder = Arc::new(AudioDecoder::new(&cfg.audio));
    let transcriber = Arc::new(WhisperTranscriber::new(&cfg.speech));
    let analyzer = Arc::new(ChatAnalyzer::new(&cfg.analysis)?);

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        store,
        decoder,
        transcriber,
        analyzer,
    ));
    let repository = Arc::new(InMemoryObservationRepository::new());

    let state = AppState::new(orchestrator, repository);
    let router = herdlog::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
