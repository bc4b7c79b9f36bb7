use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{
    common::errors::{VoiceError, VoiceResult},
    configs::PlayerConfig,
    player::entry::TrackInfo,
    sources::{
        memory::MemoryTrack,
        plugin::{ResolvedTrack, SourcePlugin},
    },
};

/// Plays files from the host filesystem, by absolute path or `file://` URI.
pub struct LocalSource {
    max_bytes: u64,
    buffer_blocks: usize,
}

impl LocalSource {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            max_bytes: config.max_track_bytes,
            buffer_blocks: config.buffer_frames,
        }
    }

    fn path_of(identifier: &str) -> &str {
        identifier.strip_prefix("file://").unwrap_or(identifier)
    }
}

#[async_trait]
impl SourcePlugin for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    fn can_handle(&self, identifier: &str) -> bool {
        identifier.starts_with("file://") || Path::new(identifier).is_absolute()
    }

    async fn load(&self, identifier: &str) -> VoiceResult<ResolvedTrack> {
        let path = Self::path_of(identifier);
        debug!("Reading local file: {}", path);

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| VoiceError::LoadFailure(format!("{}: {}", path, e)))?;
        if !metadata.is_file() {
            return Err(VoiceError::LoadFailure(format!("{} is not a file", path)));
        }
        if metadata.len() > self.max_bytes {
            return Err(VoiceError::LoadFailure(format!(
                "{} is larger than {} bytes",
                path, self.max_bytes
            )));
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| VoiceError::LoadFailure(format!("{}: {}", path, e)))?;

        let title = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown Title")
            .to_string();

        MemoryTrack::resolve(
            Bytes::from(data),
            self.buffer_blocks,
            TrackInfo {
                title,
                author: "Unknown Artist".to_string(),
                uri: Some(format!("file://{}", path)),
                length: 0,
                source_name: self.name().to_string(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::probe::tests::wav_bytes;

    #[test]
    fn handles_absolute_paths_and_file_uris() {
        let source = LocalSource::new(&PlayerConfig::default());
        assert!(source.can_handle("file:///srv/music/a.flac"));
        assert!(source.can_handle("/srv/music/a.flac"));
        assert!(!source.can_handle("music/a.flac"));
        assert!(!source.can_handle("https://example.com/a.flac"));
    }

    #[tokio::test]
    async fn loads_a_wav_file() {
        let path = std::env::temp_dir().join(format!("voxline-{}.wav", uuid::Uuid::new_v4()));
        std::fs::write(&path, wav_bytes(48_000, 96_000, 0)).unwrap();

        let source = LocalSource::new(&PlayerConfig::default());
        let track = source.load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(track.info.length, 2_000);
        assert_eq!(track.info.source_name, "local");
        assert!(track.info.title.starts_with("voxline-"));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_files_fail_to_load() {
        let source = LocalSource::new(&PlayerConfig::default());
        let result = source.load("/definitely/not/here.mp3").await;
        assert!(matches!(result, Err(VoiceError::LoadFailure(_))));
    }

    #[tokio::test]
    async fn oversized_files_are_rejected() {
        let path = std::env::temp_dir().join(format!("voxline-{}.wav", uuid::Uuid::new_v4()));
        std::fs::write(&path, wav_bytes(48_000, 4_800, 0)).unwrap();

        let config = PlayerConfig {
            max_track_bytes: 100,
            ..Default::default()
        };
        let result = LocalSource::new(&config).load(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(VoiceError::LoadFailure(_))));
        let _ = std::fs::remove_file(path);
    }
}
