pub mod client;
pub mod resolver;
pub mod voices;

pub use client::SynthesisClient;
pub use resolver::SpeechResolver;
pub use voices::{VOICES, Voice};

use async_trait::async_trait;

use crate::{common::errors::VoiceResult, sources::ResolvedTrack};

/// Speech backend used by the speech feature.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn default_voice(&self) -> &str;

    /// Canonical code for `code`, or `LoadFailure` when the voice is unknown.
    fn validate_voice(&self, code: &str) -> VoiceResult<&'static str>;

    async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<ResolvedTrack>;
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        common::errors::VoiceError,
        player::{TrackInfo, scheduler::tests::FakeTrack},
    };

    /// Records what it was asked to say and answers with a short fake clip.
    /// Holds every answer until `gate` is notified when one is set.
    #[derive(Default)]
    pub(crate) struct FakeSynthesizer {
        pub requests: Mutex<Vec<(String, String)>>,
        pub gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Synthesizer for FakeSynthesizer {
        fn default_voice(&self) -> &str {
            "en_us_001"
        }

        fn validate_voice(&self, code: &str) -> VoiceResult<&'static str> {
            voices::find(code)
                .map(|v| v.code)
                .ok_or_else(|| VoiceError::LoadFailure(format!("unknown voice '{}'", code)))
        }

        async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<ResolvedTrack> {
            self.requests
                .lock()
                .push((text.to_string(), voice.to_string()));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(ResolvedTrack {
                info: TrackInfo {
                    title: text.to_string(),
                    author: voice.to_string(),
                    uri: None,
                    length: 400,
                    source_name: "tts".to_string(),
                },
                playable: Arc::new(FakeTrack::new(20, 50)),
            })
        }
    }
}
