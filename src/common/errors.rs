use serde::Serialize;
use thiserror::Error;

use crate::common::types::GuildId;

/// Every failure a voice command can report back to its caller.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("already connected to a voice channel in guild {0}")]
    AlreadyConnected(GuildId),
    #[error("not connected to a voice channel in guild {0}")]
    NotConnected(GuildId),
    #[error("{what} must be between {min} and {max}, got {value}")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("there is no track currently playing")]
    NoCurrentTrack,
    #[error("{0} is disabled")]
    FeatureDisabled(&'static str),
    #[error("failed to persist configuration: {0}")]
    ConfigPersistence(String),
    #[error("failed to load track: {0}")]
    LoadFailure(String),
    #[error("voice transport error: {0}")]
    Transport(String),
}

impl VoiceError {
    pub fn out_of_range(what: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            what,
            value,
            min,
            max,
        }
    }

    pub fn load_failure(err: impl std::fmt::Display) -> Self {
        Self::LoadFailure(err.to_string())
    }

    /// HTTP status code used when the error crosses the control API.
    pub fn status(&self) -> u16 {
        match self {
            Self::AlreadyConnected(_) => 409,
            Self::NotConnected(_) | Self::NoCurrentTrack => 404,
            Self::OutOfRange { .. } => 400,
            Self::FeatureDisabled(_) => 403,
            Self::LoadFailure(_) => 422,
            Self::ConfigPersistence(_) => 500,
            Self::Transport(_) => 502,
        }
    }
}

pub type VoiceResult<T> = Result<T, VoiceError>;

/// JSON error body returned by the control API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    pub status: u16,
    /// HTTP reason phrase.
    pub error: String,
    pub message: String,
    pub path: String,
}

impl ErrorResponse {
    pub fn new(status: u16, error: impl Into<String>, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: crate::server::now_ms(),
            status,
            error: error.into(),
            message: message.into(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = VoiceError::out_of_range("volume", 150, 0, 100);
        assert_eq!(err.to_string(), "volume must be between 0 and 100, got 150");
        assert_eq!(err.status(), 400);

        let err = VoiceError::AlreadyConnected(GuildId(7));
        assert_eq!(err.to_string(), "already connected to a voice channel in guild 7");
        assert_eq!(err.status(), 409);
    }

    #[test]
    fn error_response_serializes_camel_case() {
        let body = ErrorResponse::new(404, "Not Found", "nope", "/v1/sessions/1");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], 404);
        assert_eq!(value["path"], "/v1/sessions/1");
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }
}
