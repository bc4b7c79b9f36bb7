//! Per-session additive mixer.
//!
//! Each session owns a [`MixSlot`] behind its own lock inside a `DashMap`, so
//! ticks for different sessions never contend. Sums are clipped to the i16
//! range without loudness normalisation.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{MixError, slot::MixSlot};
use crate::{
    audio::{
        codec::{EncodedFrame, EncoderFactory},
        stream::PcmFrame,
    },
    common::types::{GuildId, ProducerId},
};

/// A producer the mixer can ask for one frame per tick. Must not block.
pub trait FrameSource: Send + Sync {
    fn pull(&self) -> Result<Option<PcmFrame>, MixError>;
}

pub struct Mixer {
    slots: DashMap<GuildId, Arc<Mutex<MixSlot>>>,
    encoder_factory: EncoderFactory,
}

impl Mixer {
    pub fn new(encoder_factory: EncoderFactory) -> Self {
        Self {
            slots: DashMap::new(),
            encoder_factory,
        }
    }

    fn slot(&self, guild_id: &GuildId) -> Option<Arc<Mutex<MixSlot>>> {
        self.slots.get(guild_id).map(|s| s.value().clone())
    }

    /// Allocates an empty slot for a freshly connected session.
    pub fn open_slot(&self, guild_id: &GuildId) {
        self.slots
            .entry(*guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(MixSlot::new())));
    }

    /// Drops the session's slot together with any producers still in it.
    pub fn close_slot(&self, guild_id: &GuildId) -> bool {
        let Some(slot) = self.slot(guild_id) else {
            return false;
        };
        slot.lock().closed = true;
        self.slots
            .remove_if(guild_id, |_, s| Arc::ptr_eq(s, &slot))
            .is_some()
    }

    pub fn register_producer(
        &self,
        guild_id: &GuildId,
        producer_id: ProducerId,
        source: Arc<dyn FrameSource>,
    ) {
        loop {
            let slot = self
                .slots
                .entry(*guild_id)
                .or_insert_with(|| Arc::new(Mutex::new(MixSlot::new())))
                .value()
                .clone();

            let mut guard = slot.lock();
            if guard.closed {
                // Lost a race with the last deregistration; retry on a fresh slot.
                drop(guard);
                self.slots.remove_if(guild_id, |_, s| Arc::ptr_eq(s, &slot));
                continue;
            }
            if guard.register(producer_id, source) {
                debug!("[{}] registered producer {}", guild_id, producer_id);
            }
            return;
        }
    }

    /// Removes a producer. The slot goes away with its last producer.
    pub fn deregister_producer(&self, guild_id: &GuildId, producer_id: &ProducerId) {
        let Some(slot) = self.slot(guild_id) else {
            return;
        };

        let mut guard = slot.lock();
        if !guard.deregister(producer_id) {
            return;
        }
        debug!("[{}] deregistered producer {}", guild_id, producer_id);

        if guard.is_empty() {
            guard.closed = true;
            drop(guard);
            self.slots.remove_if(guild_id, |_, s| Arc::ptr_eq(s, &slot));
        }
    }

    pub fn producers(&self, guild_id: &GuildId) -> Vec<ProducerId> {
        self.slot(guild_id)
            .map(|slot| slot.lock().producer_ids())
            .unwrap_or_default()
    }

    pub fn has_slot(&self, guild_id: &GuildId) -> bool {
        self.slots.contains_key(guild_id)
    }

    /// Produces the session's next encoded frame, or `None` for silence.
    /// Never fails: errors are logged and cost only this tick.
    pub fn tick(&self, guild_id: &GuildId) -> Option<EncodedFrame> {
        let slot = self.slot(guild_id)?;
        let mut slot = slot.lock();
        match slot.mix(guild_id, &self.encoder_factory) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[{}] mix tick failed: {}", guild_id, e);
                None
            }
        }
    }
}
