use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    common::{
        errors::VoiceError,
        types::{ChannelId, GuildId},
    },
    server::{AppState, SessionInfo},
    transport::{ApiResult, WithPath},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub channel_id: ChannelId,
}

/// GET /v1/sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.registry.sessions().iter().map(|s| s.info()).collect())
}

/// GET /v1/sessions/{guildId}
pub async fn get_session(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<SessionInfo>> {
    state
        .registry
        .get(&guild_id)
        .map(|s| Json(s.info()))
        .ok_or(VoiceError::NotConnected(guild_id))
        .at(&uri)
}

/// POST /v1/sessions/{guildId}
pub async fn connect(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<ConnectRequest>,
) -> ApiResult<(StatusCode, Json<SessionInfo>)> {
    info!("POST /v1/sessions/{} -> channel {}", guild_id, body.channel_id);
    let session = state
        .registry
        .connect(guild_id, body.channel_id, state.transport.as_ref())
        .await
        .at(&uri)?;
    Ok((StatusCode::CREATED, Json(session.info())))
}

/// DELETE /v1/sessions/{guildId}
pub async fn disconnect(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    info!("DELETE /v1/sessions/{}", guild_id);
    if state.registry.disconnect(guild_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(VoiceError::NotConnected(guild_id)).at(&uri)
    }
}
