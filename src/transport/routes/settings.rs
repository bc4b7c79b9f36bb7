use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
};
use serde::{Deserialize, Deserializer, Serialize};

use super::ToggleQuery;
use crate::{
    common::types::{ChannelId, GuildId, RoleId, UserId},
    server::AppState,
    store::{ChannelLink, GuildSettings},
    transport::{ApiResult, WithPath},
};

/// Distinguishes an explicit `null` from an absent field.
fn explicit<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildSettingsPatch {
    pub music: Option<bool>,
    pub tts: Option<bool>,
    pub dj_only: Option<bool>,
    /// `null` clears the role.
    #[serde(default, deserialize_with = "explicit")]
    pub dj_role: Option<Option<RoleId>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberSettingsPatch {
    pub tts: Option<bool>,
    /// `null` resets to the default voice.
    #[serde(default, deserialize_with = "explicit")]
    pub voice: Option<Option<String>>,
}

/// Member settings with the effective voice filled in.
#[derive(Debug, Serialize)]
pub struct MemberSettingsView {
    pub tts: bool,
    pub voice: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    pub voice_channel_id: ChannelId,
}

#[derive(Debug, Serialize)]
pub struct UnlinkResponse {
    pub removed: bool,
}

/// GET /v1/guilds/{guildId}/settings
pub async fn get_guild(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<GuildSettings>> {
    state.store.guild(guild_id).await.map(Json).at(&uri)
}

/// PATCH /v1/guilds/{guildId}/settings
pub async fn update_guild(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(patch): Json<GuildSettingsPatch>,
) -> ApiResult<Json<GuildSettings>> {
    if let Some(music) = patch.music {
        state.music.set_enabled(guild_id, Some(music)).await.at(&uri)?;
    }
    if let Some(tts) = patch.tts {
        state.speech.set_enabled(guild_id, Some(tts)).await.at(&uri)?;
    }
    if let Some(dj_only) = patch.dj_only {
        state.music.set_dj_only(guild_id, Some(dj_only)).await.at(&uri)?;
    }
    if let Some(role) = patch.dj_role {
        state.music.set_dj_role(guild_id, role).await.at(&uri)?;
    }
    state.store.guild(guild_id).await.map(Json).at(&uri)
}

/// POST /v1/guilds/{guildId}/music/toggle
pub async fn toggle_music(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(toggle): Query<ToggleQuery>,
) -> ApiResult<Json<ToggleResponse>> {
    let enabled = state.music.set_enabled(guild_id, toggle.value).await.at(&uri)?;
    Ok(Json(ToggleResponse { enabled }))
}

/// POST /v1/guilds/{guildId}/tts/toggle
pub async fn toggle_guild_tts(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(toggle): Query<ToggleQuery>,
) -> ApiResult<Json<ToggleResponse>> {
    let enabled = state.speech.set_enabled(guild_id, toggle.value).await.at(&uri)?;
    Ok(Json(ToggleResponse { enabled }))
}

/// GET /v1/members/{userId}/settings
pub async fn get_member(
    Path(user_id): Path<UserId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<MemberSettingsView>> {
    member_view(&state, user_id).await.at(&uri)
}

/// PATCH /v1/members/{userId}/settings
pub async fn update_member(
    Path(user_id): Path<UserId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(patch): Json<MemberSettingsPatch>,
) -> ApiResult<Json<MemberSettingsView>> {
    if let Some(tts) = patch.tts {
        state.speech.set_member_enabled(user_id, Some(tts)).await.at(&uri)?;
    }
    if let Some(voice) = patch.voice {
        state.speech.set_voice(user_id, voice.as_deref()).await.at(&uri)?;
    }
    member_view(&state, user_id).await.at(&uri)
}

/// POST /v1/members/{userId}/tts/toggle
pub async fn toggle_member_tts(
    Path(user_id): Path<UserId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(toggle): Query<ToggleQuery>,
) -> ApiResult<Json<ToggleResponse>> {
    let enabled = state
        .speech
        .set_member_enabled(user_id, toggle.value)
        .await
        .at(&uri)?;
    Ok(Json(ToggleResponse { enabled }))
}

async fn member_view(
    state: &AppState,
    user_id: UserId,
) -> crate::common::errors::VoiceResult<Json<MemberSettingsView>> {
    let settings = state.store.member(user_id).await?;
    let voice = state.speech.voice_of(user_id).await?;
    Ok(Json(MemberSettingsView {
        tts: settings.tts,
        voice,
    }))
}

/// GET /v1/guilds/{guildId}/links
pub async fn list_links(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<Vec<ChannelLink>>> {
    state.speech.links(guild_id).await.map(Json).at(&uri)
}

/// PUT /v1/guilds/{guildId}/links/{textChannelId}
pub async fn link(
    Path((guild_id, text_channel_id)): Path<(GuildId, ChannelId)>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<LinkRequest>,
) -> ApiResult<Json<ChannelLink>> {
    state
        .speech
        .link(guild_id, text_channel_id, body.voice_channel_id)
        .await
        .map(Json)
        .at(&uri)
}

/// DELETE /v1/guilds/{guildId}/links/{textChannelId}
pub async fn unlink(
    Path((guild_id, text_channel_id)): Path<(GuildId, ChannelId)>,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Json<UnlinkResponse>> {
    let removed = state.speech.unlink(guild_id, text_channel_id).await.at(&uri)?;
    Ok(Json(UnlinkResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::routes::tests::{test_state, uri};

    #[test]
    fn patches_tell_null_from_missing() {
        let patch: GuildSettingsPatch = serde_json::from_str(r#"{"djRole": null}"#).unwrap();
        assert_eq!(patch.dj_role, Some(None));
        let patch: GuildSettingsPatch = serde_json::from_str(r#"{"music": false}"#).unwrap();
        assert_eq!(patch.dj_role, None);
        assert_eq!(patch.music, Some(false));
        let patch: GuildSettingsPatch = serde_json::from_str(r#"{"djRole": 42}"#).unwrap();
        assert_eq!(patch.dj_role, Some(Some(RoleId(42))));
    }

    #[tokio::test]
    async fn guild_settings_patch_and_toggle() {
        let state = test_state();
        let path = "/v1/guilds/1/settings";

        let Json(settings) = update_guild(
            Path(GuildId(1)),
            State(state.clone()),
            uri(path),
            Json(GuildSettingsPatch {
                tts: Some(false),
                dj_only: Some(true),
                dj_role: Some(Some(RoleId(9))),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert!(settings.music);
        assert!(!settings.tts);
        assert!(settings.dj_only);
        assert_eq!(settings.dj_role, Some(RoleId(9)));

        let Json(toggle) = toggle_music(
            Path(GuildId(1)),
            State(state.clone()),
            uri("/v1/guilds/1/music/toggle"),
            Query(ToggleQuery::default()),
        )
        .await
        .unwrap();
        assert!(!toggle.enabled);

        let Json(toggle) = toggle_guild_tts(
            Path(GuildId(1)),
            State(state.clone()),
            uri("/v1/guilds/1/tts/toggle"),
            Query(ToggleQuery { value: Some(true) }),
        )
        .await
        .unwrap();
        assert!(toggle.enabled);

        let Json(settings) = get_guild(Path(GuildId(1)), State(state), uri(path))
            .await
            .unwrap();
        assert!(!settings.music);
        assert!(settings.tts);
    }

    #[tokio::test]
    async fn member_settings() {
        let state = test_state();
        let path = "/v1/members/5/settings";

        let Json(view) = get_member(Path(UserId(5)), State(state.clone()), uri(path))
            .await
            .unwrap();
        assert!(view.tts);
        assert_eq!(view.voice, "en_us_001");

        let Json(view) = update_member(
            Path(UserId(5)),
            State(state.clone()),
            uri(path),
            Json(MemberSettingsPatch {
                tts: Some(false),
                voice: Some(Some("jp_001".into())),
            }),
        )
        .await
        .unwrap();
        assert!(!view.tts);
        assert_eq!(view.voice, "jp_001");

        let err = update_member(
            Path(UserId(5)),
            State(state.clone()),
            uri(path),
            Json(MemberSettingsPatch {
                voice: Some(Some("nobody".into())),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error.status(), 422);

        let Json(toggle) = toggle_member_tts(
            Path(UserId(5)),
            State(state),
            uri("/v1/members/5/tts/toggle"),
            Query(ToggleQuery::default()),
        )
        .await
        .unwrap();
        assert!(toggle.enabled);
    }

    #[tokio::test]
    async fn links_can_be_replaced_and_removed() {
        let state = test_state();
        let path = "/v1/guilds/2/links/10";
        link(
            Path((GuildId(2), ChannelId(10))),
            State(state.clone()),
            uri(path),
            Json(LinkRequest {
                voice_channel_id: ChannelId(11),
            }),
        )
        .await
        .unwrap();
        let Json(replaced) = link(
            Path((GuildId(2), ChannelId(10))),
            State(state.clone()),
            uri(path),
            Json(LinkRequest {
                voice_channel_id: ChannelId(12),
            }),
        )
        .await
        .unwrap();
        assert_eq!(replaced.voice_channel_id, ChannelId(12));

        let Json(links) = list_links(Path(GuildId(2)), State(state.clone()), uri("/v1/guilds/2/links"))
            .await
            .unwrap();
        assert_eq!(links, vec![replaced]);

        let Json(first) = unlink(Path((GuildId(2), ChannelId(10))), State(state.clone()), uri(path))
            .await
            .unwrap();
        assert!(first.removed);
        let Json(second) = unlink(Path((GuildId(2), ChannelId(10))), State(state), uri(path))
            .await
            .unwrap();
        assert!(!second.removed);
    }
}
