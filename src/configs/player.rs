use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Volume every new scheduler starts with, 0..=100.
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    /// Decoded PCM blocks buffered between the decoder thread and the mixer.
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: usize,
    /// Largest remote file the http source will download.
    #[serde(default = "default_max_track_bytes")]
    pub max_track_bytes: u64,
    #[serde(default = "default_true")]
    pub http_source: bool,
    #[serde(default)]
    pub local_source: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            buffer_frames: default_buffer_frames(),
            max_track_bytes: default_max_track_bytes(),
            http_source: true,
            local_source: false,
        }
    }
}

fn default_volume() -> u8 {
    100
}

fn default_buffer_frames() -> usize {
    50
}

fn default_max_track_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_true() -> bool {
    true
}
