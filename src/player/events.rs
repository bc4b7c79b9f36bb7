use serde::Serialize;

use crate::player::entry::TrackInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    /// Played to the end.
    Finished,
    Skipped,
    /// Removed by `clear` or teardown.
    Stopped,
    /// Could not be opened or failed mid-stream.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SchedulerEvent {
    TrackStart { track: TrackInfo },
    TrackEnd { track: TrackInfo, reason: TrackEndReason },
}
