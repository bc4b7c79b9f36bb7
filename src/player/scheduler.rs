//! Queue and playback state for a single audio producer.
//!
//! Commands mutate the scheduler from async handlers while the mixer calls
//! [`TrackScheduler::pull_frame`] every tick; both go through the same
//! `parking_lot::Mutex` held by the owning binding.

use std::collections::VecDeque;

use flume::{Receiver, Sender};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    audio::{
        constants::{FRAME_DURATION_MS, MAX_VOLUME, MIN_VOLUME},
        stream::{FramePoll, PcmFrame, TrackStream},
    },
    common::errors::{VoiceError, VoiceResult},
    player::{
        entry::{QueueEntry, TrackInfo},
        events::{SchedulerEvent, TrackEndReason},
    },
};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Point-in-time copy of the scheduler for queue displays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSnapshot {
    pub state: PlaybackState,
    pub current: Option<TrackInfo>,
    pub queue: Vec<TrackInfo>,
    pub looping: bool,
    pub volume: u8,
    /// Playback position of `current` in milliseconds.
    pub position: u64,
}

struct ActiveTrack {
    entry: QueueEntry,
    stream: Box<dyn TrackStream>,
}

pub struct TrackScheduler {
    label: String,
    current: Option<ActiveTrack>,
    queue: VecDeque<QueueEntry>,
    paused: bool,
    looping: bool,
    volume: u8,
    position_ms: u64,
    events: Option<Sender<SchedulerEvent>>,
}

impl TrackScheduler {
    /// `label` only tags log lines, e.g. `"1234/music"`.
    pub fn new(label: impl Into<String>, volume: u8) -> Self {
        Self {
            label: label.into(),
            current: None,
            queue: VecDeque::new(),
            paused: false,
            looping: false,
            volume: volume.min(MAX_VOLUME as u8),
            position_ms: 0,
            events: None,
        }
    }

    /// Starts delivering track events. Events are dropped when the receiver
    /// falls behind; a new subscription replaces the previous one.
    pub fn subscribe(&mut self) -> Receiver<SchedulerEvent> {
        let (tx, rx) = flume::bounded(EVENT_BUFFER);
        self.events = Some(tx);
        rx
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.current, self.paused) {
            (None, _) => PlaybackState::Idle,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Playing,
        }
    }

    pub fn current(&self) -> Option<&TrackInfo> {
        self.current.as_ref().map(|a| &a.entry.info)
    }

    /// Pending entries, not counting the current track.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            state: self.state(),
            current: self.current().cloned(),
            queue: self.queue.iter().map(|e| e.info.clone()).collect(),
            looping: self.looping,
            volume: self.volume,
            position: self.position_ms,
        }
    }

    pub fn enqueue(&mut self, entry: QueueEntry) {
        debug!("[{}] queued '{}'", self.label, entry.info.title);
        self.queue.push_back(entry);
        if self.current.is_none() {
            self.promote_next();
        }
    }

    /// Drops the current track and moves on. Returns what was skipped.
    pub fn skip(&mut self) -> Option<TrackInfo> {
        self.advance(TrackEndReason::Skipped)
    }

    /// Removes the entry at 1-based `position` of the pending queue.
    pub fn remove_at(&mut self, position: i64) -> VoiceResult<QueueEntry> {
        let len = self.queue.len() as i64;
        if position < 1 || position > len {
            return Err(VoiceError::out_of_range("queue position", position, 1, len));
        }
        self.queue
            .remove((position - 1) as usize)
            .ok_or(VoiceError::out_of_range("queue position", position, 1, len))
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        if let Some(active) = self.current.take() {
            self.emit(SchedulerEvent::TrackEnd {
                track: active.entry.info,
                reason: TrackEndReason::Stopped,
            });
        }
        self.go_idle();
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.current.is_some() {
            self.paused = paused;
        }
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    pub fn set_volume(&mut self, volume: i64) -> VoiceResult<()> {
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&volume) {
            return Err(VoiceError::out_of_range("volume", volume, MIN_VOLUME, MAX_VOLUME));
        }
        self.volume = volume as u8;
        Ok(())
    }

    pub fn seek(&mut self, position_ms: i64) -> VoiceResult<()> {
        let active = self.current.as_mut().ok_or(VoiceError::NoCurrentTrack)?;
        let duration = active.entry.duration_ms() as i64;
        if !(0..=duration).contains(&position_ms) {
            return Err(VoiceError::out_of_range("seek position", position_ms, 0, duration));
        }
        if !active.stream.seek(position_ms as u64) {
            debug!(
                "[{}] decoder for '{}' is gone, reopening at {}ms",
                self.label, active.entry.info.title, position_ms
            );
            active.stream = active.entry.open(position_ms as u64)?;
        }
        self.position_ms = position_ms as u64;
        Ok(())
    }

    /// Called when the current track runs out of audio.
    pub fn on_track_end(&mut self) {
        if !self.looping {
            self.advance(TrackEndReason::Finished);
            return;
        }

        let Some(active) = self.current.as_mut() else {
            return;
        };
        match active.entry.open(0) {
            Ok(stream) => {
                debug!("[{}] looping '{}'", self.label, active.entry.info.title);
                active.stream = stream;
                self.position_ms = 0;
            }
            Err(e) => {
                warn!("[{}] could not restart looped track: {}", self.label, e);
                self.advance(TrackEndReason::Failed);
            }
        }
    }

    /// Next frame of the current track with volume applied. Never blocks.
    pub fn pull_frame(&mut self) -> Option<PcmFrame> {
        if self.paused {
            return None;
        }
        let active = self.current.as_mut()?;

        match active.stream.poll_frame() {
            FramePoll::Ready(mut frame) => {
                self.position_ms =
                    (self.position_ms + FRAME_DURATION_MS).min(active.entry.duration_ms());
                apply_volume(&mut frame, self.volume);
                Some(frame)
            }
            FramePoll::Pending => None,
            FramePoll::Finished => {
                self.on_track_end();
                None
            }
            FramePoll::Failed(reason) => {
                warn!(
                    "[{}] '{}' failed during playback: {}",
                    self.label, active.entry.info.title, reason
                );
                self.advance(TrackEndReason::Failed);
                None
            }
        }
    }

    fn advance(&mut self, reason: TrackEndReason) -> Option<TrackInfo> {
        let ended = self.current.take().map(|active| active.entry.info);
        if let Some(track) = &ended {
            self.emit(SchedulerEvent::TrackEnd {
                track: track.clone(),
                reason,
            });
        }
        self.promote_next();
        ended
    }

    fn promote_next(&mut self) {
        self.position_ms = 0;
        while let Some(entry) = self.queue.pop_front() {
            match entry.open(0) {
                Ok(stream) => {
                    debug!("[{}] now playing '{}'", self.label, entry.info.title);
                    self.emit(SchedulerEvent::TrackStart {
                        track: entry.info.clone(),
                    });
                    self.current = Some(ActiveTrack { entry, stream });
                    return;
                }
                Err(e) => {
                    warn!("[{}] could not start '{}': {}", self.label, entry.info.title, e);
                    self.emit(SchedulerEvent::TrackEnd {
                        track: entry.info,
                        reason: TrackEndReason::Failed,
                    });
                }
            }
        }
        self.go_idle();
    }

    fn go_idle(&mut self) {
        self.current = None;
        self.position_ms = 0;
        self.paused = false;
        self.looping = false;
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}

fn apply_volume(frame: &mut [i16], volume: u8) {
    if volume as i64 == MAX_VOLUME {
        return;
    }
    let volume = volume as i32;
    for sample in frame.iter_mut() {
        *sample = (*sample as i32 * volume / MAX_VOLUME as i32) as i16;
    }
}
