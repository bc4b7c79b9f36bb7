use std::sync::Arc;

use serde::Serialize;

use crate::{
    audio::stream::TrackStream,
    common::{errors::VoiceResult, types::UserId},
};

/// Immutable description of a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub title: String,
    pub author: String,
    pub uri: Option<String>,
    /// Duration in milliseconds.
    pub length: u64,
    pub source_name: String,
}

/// Something that can start decoding on demand, possibly more than once
/// (looping reopens the current track).
pub trait Playable: Send + Sync {
    fn open(&self, start_ms: u64) -> VoiceResult<Box<dyn TrackStream>>;
}

/// A queued track plus the member who asked for it.
#[derive(Clone)]
pub struct QueueEntry {
    pub info: TrackInfo,
    pub requester: UserId,
    playable: Arc<dyn Playable>,
}

impl QueueEntry {
    pub fn new(info: TrackInfo, requester: UserId, playable: Arc<dyn Playable>) -> Self {
        Self {
            info,
            requester,
            playable,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.info.length
    }

    pub(crate) fn open(&self, start_ms: u64) -> VoiceResult<Box<dyn TrackStream>> {
        self.playable.open(start_ms)
    }
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("info", &self.info)
            .field("requester", &self.requester)
            .finish_non_exhaustive()
    }
}
