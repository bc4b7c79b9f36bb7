use std::sync::Arc;

use crate::{
    configs::Config,
    features::{MusicService, SpeechService},
    gateway::TransportFactory,
    server::SessionRegistry,
    store::ConfigStore,
};

/// Top-level application state shared by every HTTP handler.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub transport: Arc<dyn TransportFactory>,
    pub music: Arc<MusicService>,
    pub speech: Arc<SpeechService>,
    pub store: Arc<dyn ConfigStore>,
    /// Names of the enabled track sources.
    pub source_names: Vec<String>,
    /// Unix timestamp in milliseconds.
    pub started_at: u64,
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
