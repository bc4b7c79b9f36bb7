pub mod binding;
pub mod entry;
pub mod events;
pub mod scheduler;

pub use binding::{PendingLoad, ProducerBinding};
pub use entry::{Playable, QueueEntry, TrackInfo};
pub use events::{SchedulerEvent, TrackEndReason};
pub use scheduler::{PlaybackState, SchedulerSnapshot, TrackScheduler};
