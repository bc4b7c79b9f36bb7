//! Timing and sizing constants shared by the decode, mix and send paths.

// ── Frame layout ─────────────────────────────────────────────────────────────

/// Output sample rate (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// Interleaved channel count of every PCM frame.
pub const MIXER_CHANNELS: usize = 2;

/// Duration of one frame and of one send-loop tick.
pub const FRAME_DURATION_MS: u64 = 20;

/// Samples per channel in one 20 ms frame.
pub const FRAME_SAMPLES_PER_CHANNEL: usize = 960;

/// Interleaved samples in one 20 ms stereo frame.
pub const FRAME_SIZE_SAMPLES: usize = FRAME_SAMPLES_PER_CHANNEL * MIXER_CHANNELS;

// ── Codec ────────────────────────────────────────────────────────────────────

/// Upper bound for one encoded Opus packet.
pub const MAX_OPUS_PACKET_BYTES: usize = 4_000;

/// Opus frame encoding 20 ms of silence.
pub const SILENCE_FRAME: [u8; 3] = [0xF8, 0xFF, 0xFE];

/// Silence frames sent after audio stops so the receiver's decoder does not
/// interpolate the last packet.
pub const MAX_SILENCE_FRAMES: u32 = 5;

// ── Scheduler ────────────────────────────────────────────────────────────────

pub const MIN_VOLUME: i64 = 0;
pub const MAX_VOLUME: i64 = 100;
