pub mod music;
pub mod speech;

pub use music::MusicService;
pub use speech::SpeechService;

use flume::Receiver;
use tracing::{debug, info};

use crate::player::{SchedulerEvent, TrackEndReason};

/// Logs scheduler events until the scheduler is dropped.
async fn log_events(label: String, events: Receiver<SchedulerEvent>) {
    while let Ok(event) = events.recv_async().await {
        match event {
            SchedulerEvent::TrackStart { track } => {
                info!("[{}] now playing '{}' by {}", label, track.title, track.author);
            }
            SchedulerEvent::TrackEnd { track, reason } if reason == TrackEndReason::Failed => {
                info!("[{}] '{}' failed to play", label, track.title);
            }
            SchedulerEvent::TrackEnd { track, reason } => {
                debug!("[{}] '{}' ended: {:?}", label, track.title, reason);
            }
        }
    }
}

/// Resolves an explicit toggle value, flipping `current` when none is given.
fn toggled(current: bool, value: Option<bool>) -> bool {
    value.unwrap_or(!current)
}
