use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    common::types::{GuildId, UserId},
    player::{PlaybackState, SchedulerSnapshot, TrackInfo},
    server::AppState,
    transport::{
        ApiResult, WithPath,
        routes::{LoadResponse, WaitQuery, reply_to_load},
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub query: String,
    pub requester: UserId,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    /// Milliseconds into the current track.
    pub position: i64,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: PlaybackState,
}

#[derive(Debug, Serialize)]
pub struct LoopResponse {
    pub looping: bool,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    pub skipped: Option<TrackInfo>,
}

/// GET /v1/sessions/{guildId}/music
pub async fn get_queue(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<SchedulerSnapshot>> {
    state.music.queue(guild_id).await.map(Json).at(&uri)
}

/// POST /v1/sessions/{guildId}/music/tracks
pub async fn play(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<WaitQuery>,
    Json(body): Json<PlayRequest>,
) -> ApiResult<LoadResponse> {
    let pending = state
        .music
        .play(guild_id, &body.query, body.requester)
        .await
        .at(&uri)?;
    reply_to_load(pending, query.wait, &uri).await
}

/// DELETE /v1/sessions/{guildId}/music/tracks
pub async fn clear(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    state.music.clear(guild_id).await.at(&uri)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/sessions/{guildId}/music/tracks/{position}
pub async fn remove(
    Path((guild_id, position)): Path<(GuildId, i64)>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<TrackInfo>> {
    state.music.remove(guild_id, position).await.map(Json).at(&uri)
}

/// POST /v1/sessions/{guildId}/music/skip
pub async fn skip(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<SkipResponse>> {
    let skipped = state.music.skip(guild_id).await.at(&uri)?;
    Ok(Json(SkipResponse { skipped }))
}

/// POST /v1/sessions/{guildId}/music/pause
pub async fn pause(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<StateResponse>> {
    let state = state.music.set_paused(guild_id, true).await.at(&uri)?;
    Ok(Json(StateResponse { state }))
}

/// POST /v1/sessions/{guildId}/music/resume
pub async fn resume(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<StateResponse>> {
    let state = state.music.set_paused(guild_id, false).await.at(&uri)?;
    Ok(Json(StateResponse { state }))
}

/// POST /v1/sessions/{guildId}/music/loop
pub async fn toggle_loop(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<LoopResponse>> {
    let looping = state.music.toggle_loop(guild_id).await.at(&uri)?;
    Ok(Json(LoopResponse { looping }))
}

/// PUT /v1/sessions/{guildId}/music/volume
pub async fn set_volume(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<VolumeRequest>,
) -> ApiResult<StatusCode> {
    state.music.set_volume(guild_id, body.volume).await.at(&uri)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/sessions/{guildId}/music/position
pub async fn seek(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<SeekRequest>,
) -> ApiResult<StatusCode> {
    state.music.seek(guild_id, body.position).await.at(&uri)?;
    Ok(StatusCode::NO_CONTENT)
}
