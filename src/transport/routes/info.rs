use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::{
    server::{AppState, now_ms},
    tts::{VOICES, Voice},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub version: String,
    pub build_time: u64,
    pub git: GitInfo,
    pub sources: Vec<String>,
    pub sessions: usize,
    pub uptime: u64,
}

#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub branch: String,
    pub commit: String,
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// GET /v1/info
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<Info> {
    tracing::debug!("GET /v1/info");
    Json(Info {
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_time: option_env!("BUILD_TIME")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        git: GitInfo {
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown").to_string(),
            commit: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
        },
        sources: state.source_names.clone(),
        sessions: state.registry.sessions().len(),
        uptime: now_ms().saturating_sub(state.started_at),
    })
}

/// GET /v1/voices
pub async fn get_voices() -> Json<&'static [Voice]> {
    Json(VOICES)
}
