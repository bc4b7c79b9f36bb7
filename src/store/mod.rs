pub mod json;

pub use json::JsonConfigStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{
    errors::VoiceResult,
    types::{ChannelId, GuildId, RoleId, UserId},
};

/// Per-guild feature switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuildSettings {
    pub music: bool,
    pub tts: bool,
    pub dj_only: bool,
    pub dj_role: Option<RoleId>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            music: true,
            tts: true,
            dj_only: false,
            dj_role: None,
        }
    }
}

/// Per-member speech preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberSettings {
    pub tts: bool,
    /// `None` means the configured default voice.
    pub voice: Option<String>,
}

impl Default for MemberSettings {
    fn default() -> Self {
        Self {
            tts: true,
            voice: None,
        }
    }
}

/// Routes messages from a text channel to speech in a voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLink {
    pub guild_id: GuildId,
    pub text_channel_id: ChannelId,
    pub voice_channel_id: ChannelId,
}

pub type GuildChange = Box<dyn FnOnce(&mut GuildSettings) + Send>;
pub type MemberChange = Box<dyn FnOnce(&mut MemberSettings) + Send>;

/// Persistent settings. Every write either persists or fails with
/// `ConfigPersistence` leaving the previous value in place.
///
/// Updates run read, change and write under one lock, so concurrent toggles
/// of the same record never lose a write.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn guild(&self, guild_id: GuildId) -> VoiceResult<GuildSettings>;
    /// Applies `change` and returns the stored result.
    async fn update_guild(
        &self,
        guild_id: GuildId,
        change: GuildChange,
    ) -> VoiceResult<GuildSettings>;

    async fn member(&self, user_id: UserId) -> VoiceResult<MemberSettings>;
    async fn update_member(
        &self,
        user_id: UserId,
        change: MemberChange,
    ) -> VoiceResult<MemberSettings>;

    async fn links(&self, guild_id: GuildId) -> VoiceResult<Vec<ChannelLink>>;
    /// Replaces any existing link for the same text channel.
    async fn link(&self, link: ChannelLink) -> VoiceResult<()>;
    /// Returns whether a link was removed.
    async fn unlink(&self, guild_id: GuildId, text_channel_id: ChannelId) -> VoiceResult<bool>;
}
