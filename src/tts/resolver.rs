use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::errors::{VoiceError, VoiceResult},
    configs::TtsConfig,
    player::entry::TrackInfo,
    sources::{MemoryTrack, ResolvedTrack, TrackResolver},
    tts::{Synthesizer, client::SynthesisClient, voices},
};

const TITLE_CHARS: usize = 50;

/// Turns text into an in-memory speech track.
pub struct SpeechResolver {
    client: Arc<SynthesisClient>,
    default_voice: String,
    max_length: usize,
    buffer_blocks: usize,
}

impl SpeechResolver {
    pub fn new(client: Arc<SynthesisClient>, config: &TtsConfig, buffer_blocks: usize) -> Self {
        Self {
            client,
            default_voice: config.default_voice.clone(),
            max_length: config.max_length,
            buffer_blocks,
        }
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    /// Rejects unknown voice codes, returning the canonical code otherwise.
    pub fn validate_voice(&self, code: &str) -> VoiceResult<&'static str> {
        voices::find(code)
            .map(|v| v.code)
            .ok_or_else(|| VoiceError::LoadFailure(format!("unknown voice '{}'", code)))
    }

    /// Collapses whitespace and enforces the length limit.
    pub fn prepare_text(&self, text: &str) -> VoiceResult<String> {
        let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let length = cleaned.chars().count();
        if length == 0 || length > self.max_length {
            return Err(VoiceError::out_of_range(
                "message length",
                length as i64,
                1,
                self.max_length as i64,
            ));
        }
        Ok(cleaned)
    }

    pub async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<ResolvedTrack> {
        let text = self.prepare_text(text)?;
        let voice = self.validate_voice(voice)?;
        let audio = self.client.synthesize(&text, voice).await?;

        MemoryTrack::resolve(
            audio,
            self.buffer_blocks,
            TrackInfo {
                title: title_for(&text),
                author: voice.to_string(),
                uri: None,
                length: 0,
                source_name: "tts".to_string(),
            },
        )
        .await
    }
}

fn title_for(text: &str) -> String {
    if text.chars().count() > TITLE_CHARS {
        let head: String = text.chars().take(TITLE_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[async_trait]
impl Synthesizer for SpeechResolver {
    fn default_voice(&self) -> &str {
        &self.default_voice
    }

    fn validate_voice(&self, code: &str) -> VoiceResult<&'static str> {
        SpeechResolver::validate_voice(self, code)
    }

    async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<ResolvedTrack> {
        SpeechResolver::synthesize(self, text, voice).await
    }
}

#[async_trait]
impl TrackResolver for SpeechResolver {
    async fn resolve(&self, query: &str) -> VoiceResult<ResolvedTrack> {
        self.synthesize(query, &self.default_voice).await
    }
}
