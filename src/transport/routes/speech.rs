use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    common::types::{ChannelId, GuildId, UserId},
    player::{SchedulerSnapshot, TrackInfo},
    server::AppState,
    transport::{
        ApiResult, WithPath,
        routes::{LoadResponse, WaitQuery, reply_to_load},
    },
};

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub member: UserId,
    pub text: String,
}

/// A chat message relayed from a text channel.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub channel_id: ChannelId,
    pub member: UserId,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// False when the channel is not linked to the session.
    pub accepted: bool,
    /// Only filled in with `?wait=true`.
    pub spoken: Option<TrackInfo>,
}

/// POST /v1/sessions/{guildId}/speech
pub async fn speak(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<WaitQuery>,
    Json(body): Json<SpeakRequest>,
) -> ApiResult<LoadResponse> {
    let pending = state
        .speech
        .speak(guild_id, body.member, &body.text)
        .await
        .at(&uri)?;
    reply_to_load(pending, query.wait, &uri).await
}

/// POST /v1/sessions/{guildId}/speech/messages
pub async fn relay_message(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<WaitQuery>,
    Json(body): Json<MessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let pending = state
        .speech
        .handle_message(guild_id, body.channel_id, body.member, &body.text)
        .await
        .at(&uri)?;
    let Some(pending) = pending else {
        return Ok(Json(MessageResponse {
            accepted: false,
            spoken: None,
        }));
    };
    let spoken = match reply_to_load(pending, query.wait, &uri).await? {
        LoadResponse::Queued(track) => Some(track),
        LoadResponse::Accepted => None,
    };
    Ok(Json(MessageResponse {
        accepted: true,
        spoken,
    }))
}

/// GET /v1/sessions/{guildId}/speech
pub async fn get_queue(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<SchedulerSnapshot>> {
    state.speech.queue(guild_id).map(Json).at(&uri)
}

/// POST /v1/sessions/{guildId}/speech/skip
pub async fn skip(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<super::music::SkipResponse>> {
    let skipped = state.speech.skip(guild_id).at(&uri)?;
    Ok(Json(super::music::SkipResponse { skipped }))
}

/// DELETE /v1/sessions/{guildId}/speech
pub async fn stop(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<StatusCode> {
    state.speech.stop(guild_id).at(&uri)?;
    Ok(StatusCode::NO_CONTENT)
}
