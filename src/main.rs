use std::{net::SocketAddr, sync::Arc, time::Duration};

use tracing::{error, info, warn};
use voxline::{
    audio::{Mixer, codec::opus_encoder_factory},
    common::{HttpClient, logger, types::AnyResult},
    configs::Config,
    features::{MusicService, SpeechService},
    gateway::RtpTransportFactory,
    log_println,
    server::{AppState, SessionRegistry, now_ms},
    sources::SourceManager,
    store::{ConfigStore, JsonConfigStore},
    transport,
    tts::{SpeechResolver, SynthesisClient},
};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log_println!("Failed to load configuration ({}), using defaults", e);
            Config::default()
        }
    };
    logger::init(config.logging.as_ref());

    let mixer = Arc::new(Mixer::new(opus_encoder_factory()));
    let registry = SessionRegistry::new(mixer.clone(), config.transport.max_send_failures);

    let store: Arc<dyn ConfigStore> = match &config.store.path {
        Some(path) => Arc::new(JsonConfigStore::open(path).await?),
        None => {
            warn!("No store.path configured; settings will not survive a restart");
            Arc::new(JsonConfigStore::in_memory())
        }
    };

    let sources = Arc::new(SourceManager::new(&config.player, HttpClient::new()?));
    let synthesis = Arc::new(SynthesisClient::new(
        HttpClient::with_timeout(Duration::from_secs(config.tts.timeout_secs))?,
        &config.tts.base_url,
    ));
    let speech_resolver = Arc::new(SpeechResolver::new(
        synthesis,
        &config.tts,
        config.player.buffer_frames,
    ));

    let music = Arc::new(MusicService::new(
        mixer.clone(),
        sources.clone(),
        store.clone(),
        config.player.default_volume,
    ));
    let speech = Arc::new(SpeechService::new(
        mixer,
        speech_resolver,
        store.clone(),
        config.player.default_volume,
    ));
    registry.subscribe(music.clone());
    registry.subscribe(speech.clone());

    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = Arc::new(AppState {
        transport: Arc::new(RtpTransportFactory::new(config.transport.endpoint.clone())),
        config,
        registry: registry.clone(),
        music,
        speech,
        store,
        source_names: sources.source_names(),
        started_at: now_ms(),
    });

    let app = transport::router(state);
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("voxline {} listening on {}", env!("CARGO_PKG_VERSION"), address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("HTTP server failed: {}", e);
    }

    registry.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
