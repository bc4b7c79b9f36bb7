use base64::{Engine, prelude::BASE64_STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::errors::{VoiceError, VoiceResult};

#[derive(Serialize)]
struct GenerationRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    success: bool,
    data: Option<String>,
    error: Option<String>,
}

/// Client for the remote text-to-speech service.
pub struct SynthesisClient {
    http: reqwest::Client,
    base_url: String,
}

impl SynthesisClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns MP3 audio for `text` spoken by `voice`.
    pub async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Bytes> {
        debug!("Synthesizing {} chars with voice {}", text.chars().count(), voice);

        let body = self
            .http
            .post(format!("{}/api/generation", self.base_url))
            .json(&GenerationRequest { text, voice })
            .send()
            .await
            .map_err(VoiceError::load_failure)?
            .text()
            .await
            .map_err(VoiceError::load_failure)?;

        let encoded = parse_generation_response(&body)?;
        BASE64_STANDARD
            .decode(encoded.trim())
            .map(Bytes::from)
            .map_err(|e| VoiceError::LoadFailure(format!("invalid audio payload: {}", e)))
    }
}

/// Extracts the base64 audio from a generation response body.
pub(crate) fn parse_generation_response(body: &str) -> VoiceResult<String> {
    let response: GenerationResponse = serde_json::from_str(body)
        .map_err(|e| VoiceError::LoadFailure(format!("malformed synthesis response: {}", e)))?;

    if !response.success {
        let reason = response
            .error
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(VoiceError::LoadFailure(format!("synthesis failed: {}", reason)));
    }

    response
        .data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| VoiceError::LoadFailure("synthesis returned no audio".to_string()))
}
