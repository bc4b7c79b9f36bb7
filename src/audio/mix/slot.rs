use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use tracing::warn;

use super::{FrameSource, MixError};
use crate::{
    audio::{
        codec::{EncodedFrame, EncoderFactory, FrameEncoder},
        constants::FRAME_SIZE_SAMPLES,
    },
    common::types::{GuildId, ProducerId},
};

/// Per-session mixer state: the registered producers and the session's encoder.
pub(crate) struct MixSlot {
    producers: Vec<(ProducerId, Arc<dyn FrameSource>)>,
    encoder: Option<Box<dyn FrameEncoder>>,
    acc: Vec<i32>,
    pcm: Vec<i16>,
    /// Set once the slot has been taken out of the mixer map.
    pub(crate) closed: bool,
}

impl MixSlot {
    pub(crate) fn new() -> Self {
        Self {
            producers: Vec::new(),
            encoder: None,
            acc: vec![0; FRAME_SIZE_SAMPLES],
            pcm: vec![0; FRAME_SIZE_SAMPLES],
            closed: false,
        }
    }

    /// Returns `true` when the producer was not registered before.
    pub(crate) fn register(&mut self, id: ProducerId, source: Arc<dyn FrameSource>) -> bool {
        if let Some(entry) = self.producers.iter_mut().find(|(p, _)| *p == id) {
            entry.1 = source;
            return false;
        }
        self.producers.push((id, source));
        true
    }

    pub(crate) fn deregister(&mut self, id: &ProducerId) -> bool {
        let before = self.producers.len();
        self.producers.retain(|(p, _)| p != id);
        self.producers.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    pub(crate) fn producer_ids(&self) -> Vec<ProducerId> {
        self.producers.iter().map(|(id, _)| *id).collect()
    }

    /// Pulls one frame from every producer, sums them with clipping and encodes.
    /// Producer failures are logged and skipped; only encoding can fail the tick,
    /// and an encoder panic surfaces as [`MixError::EncoderPanic`].
    pub(crate) fn mix(
        &mut self,
        guild_id: &GuildId,
        encoder_factory: &EncoderFactory,
    ) -> Result<Option<EncodedFrame>, MixError> {
        self.acc.fill(0);
        let mut contributions = 0usize;

        for (id, source) in &self.producers {
            let pulled = panic::catch_unwind(AssertUnwindSafe(|| source.pull()))
                .unwrap_or_else(|_| Err(MixError::ProducerPanic(*id)));

            match pulled {
                Ok(Some(frame)) => {
                    for (acc, &sample) in self.acc.iter_mut().zip(frame.iter()) {
                        *acc += sample as i32;
                    }
                    contributions += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("[{}] skipping producer this tick: {}", guild_id, e),
            }
        }

        if contributions == 0 {
            return Ok(None);
        }

        for (out, &sum) in self.pcm.iter_mut().zip(self.acc.iter()) {
            *out = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }

        if self.encoder.is_none() {
            self.encoder = Some(encoder_factory()?);
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(None);
        };
        let pcm = &self.pcm;
        match panic::catch_unwind(AssertUnwindSafe(|| encoder.encode(pcm))) {
            Ok(encoded) => Ok(Some(encoded?)),
            Err(_) => {
                // a panicked encoder may hold broken state; build a new one next tick
                self.encoder = None;
                Err(MixError::EncoderPanic)
            }
        }
    }
}
