use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{ChannelLink, ConfigStore, GuildChange, GuildSettings, MemberChange, MemberSettings};
use crate::common::{
    errors::{VoiceError, VoiceResult},
    types::{ChannelId, GuildId, UserId},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct StoreData {
    guilds: HashMap<u64, GuildSettings>,
    members: HashMap<u64, MemberSettings>,
    links: Vec<ChannelLink>,
}

/// Settings cached in memory and written through to a JSON file.
/// Without a path the store lives in memory only.
pub struct JsonConfigStore {
    path: Option<PathBuf>,
    data: RwLock<StoreData>,
}

fn persistence(err: impl std::fmt::Display) -> VoiceError {
    VoiceError::ConfigPersistence(err.to_string())
}

impl JsonConfigStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(StoreData::default()),
        }
    }

    /// Loads `path` if it exists, otherwise starts empty and creates it on
    /// the first write.
    pub async fn open(path: impl AsRef<Path>) -> VoiceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => StoreData::default(),
            Ok(raw) => serde_json::from_str(&raw).map_err(persistence)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(persistence(e)),
        };
        info!(
            "Loaded settings for {} guilds and {} members from {}",
            data.guilds.len(),
            data.members.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    async fn persist(&self, data: &StoreData) -> VoiceResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_vec_pretty(data).map_err(persistence)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await.map_err(persistence)?;
        tokio::fs::rename(&tmp, path).await.map_err(persistence)?;
        debug!("Settings written to {}", path.display());
        Ok(())
    }

    /// Applies `change` to a copy, persists it and only then swaps it in.
    async fn update<R>(&self, change: impl FnOnce(&mut StoreData) -> R) -> VoiceResult<R> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let result = change(&mut next);
        self.persist(&next).await?;
        *data = next;
        Ok(result)
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn guild(&self, guild_id: GuildId) -> VoiceResult<GuildSettings> {
        Ok(self
            .data
            .read()
            .await
            .guilds
            .get(&guild_id.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_guild(
        &self,
        guild_id: GuildId,
        change: GuildChange,
    ) -> VoiceResult<GuildSettings> {
        self.update(|d| {
            let settings = d.guilds.entry(guild_id.0).or_default();
            change(settings);
            settings.clone()
        })
        .await
    }

    async fn member(&self, user_id: UserId) -> VoiceResult<MemberSettings> {
        Ok(self
            .data
            .read()
            .await
            .members
            .get(&user_id.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_member(
        &self,
        user_id: UserId,
        change: MemberChange,
    ) -> VoiceResult<MemberSettings> {
        self.update(|d| {
            let settings = d.members.entry(user_id.0).or_default();
            change(settings);
            settings.clone()
        })
        .await
    }

    async fn links(&self, guild_id: GuildId) -> VoiceResult<Vec<ChannelLink>> {
        Ok(self
            .data
            .read()
            .await
            .links
            .iter()
            .filter(|l| l.guild_id == guild_id)
            .copied()
            .collect())
    }

    async fn link(&self, link: ChannelLink) -> VoiceResult<()> {
        self.update(|d| {
            d.links.retain(|l| {
                !(l.guild_id == link.guild_id && l.text_channel_id == link.text_channel_id)
            });
            d.links.push(link);
        })
        .await
    }

    async fn unlink(&self, guild_id: GuildId, text_channel_id: ChannelId) -> VoiceResult<bool> {
        self.update(|d| {
            let before = d.links.len();
            d.links
                .retain(|l| !(l.guild_id == guild_id && l.text_channel_id == text_channel_id));
            d.links.len() != before
        })
        .await
    }
}
