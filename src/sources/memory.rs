use std::sync::Arc;

use bytes::Bytes;

use crate::{
    audio::{
        probe::probe,
        stream::{DecodedStream, TrackStream},
    },
    common::errors::{VoiceError, VoiceResult},
    player::entry::{Playable, TrackInfo},
    sources::plugin::ResolvedTrack,
};

/// Fully downloaded audio, decoded afresh on every `open`.
pub struct MemoryTrack {
    data: Bytes,
    buffer_blocks: usize,
}

impl MemoryTrack {
    pub fn new(data: Bytes, buffer_blocks: usize) -> Self {
        Self {
            data,
            buffer_blocks,
        }
    }

    /// Probes `data` on the blocking pool and wraps it as a resolved track.
    /// Tag values win over the supplied fallbacks.
    pub async fn resolve(
        data: Bytes,
        buffer_blocks: usize,
        fallback: TrackInfo,
    ) -> VoiceResult<ResolvedTrack> {
        let probe_data = data.clone();
        let probed = tokio::task::spawn_blocking(move || probe(probe_data))
            .await
            .map_err(VoiceError::load_failure)?
            .map_err(VoiceError::load_failure)?;

        let info = TrackInfo {
            title: probed.title.unwrap_or(fallback.title),
            author: probed.author.unwrap_or(fallback.author),
            length: if probed.duration_ms > 0 {
                probed.duration_ms
            } else {
                fallback.length
            },
            ..fallback
        };

        Ok(ResolvedTrack {
            info,
            playable: Arc::new(Self::new(data, buffer_blocks)),
        })
    }
}

impl Playable for MemoryTrack {
    fn open(&self, start_ms: u64) -> VoiceResult<Box<dyn TrackStream>> {
        Ok(Box::new(DecodedStream::spawn(
            self.data.clone(),
            self.buffer_blocks,
            start_ms,
        )))
    }
}
