use async_trait::async_trait;
use bytes::BytesMut;
use regex::Regex;
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

/// Downloads direct audio links in full before playback.
pub struct HttpSource {
    client: reqwest::Client,
    url_regex: Regex,
    max_bytes: u64,
    buffer_blocks: usize,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, config: &PlayerConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            url_regex: Regex::new(r"^https?://\S+$")?,
            max_bytes: config.max_track_bytes,
            buffer_blocks: config.buffer_frames,
        })
    }

    async fn download(&self, url: &str) -> VoiceResult<bytes::Bytes> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(VoiceError::load_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::LoadFailure(format!("{} returned {}", url, status)));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large());
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(VoiceError::load_failure)? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    fn too_large(&self) -> VoiceError {
        VoiceError::LoadFailure(format!("file is larger than {} bytes", self.max_bytes))
    }
}

/// Last path segment without the query string.
pub fn title_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("Unknown Title")
        .to_string()
}

#[async_trait]
impl SourcePlugin for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn can_handle(&self, identifier: &str) -> bool {
        self.url_regex.is_match(identifier)
    }

    async fn load(&self, identifier: &str) -> VoiceResult<ResolvedTrack> {
        debug!("Fetching HTTP source: {}", identifier);
        let data = self.download(identifier).await?;

        MemoryTrack::resolve(
            data,
            self.buffer_blocks,
            TrackInfo {
                title: title_from_url(identifier),
                author: "Unknown Artist".to_string(),
                uri: Some(identifier.to_string()),
                length: 0,
                source_name: self.name().to_string(),
            },
        )
        .await
    }
}
