pub mod codec;
pub mod constants;
pub mod format;
pub mod mix;
pub mod probe;
pub mod processor;
pub mod resample;
pub mod stream;

pub use codec::{EncodedFrame, FrameEncoder, OpusFrameEncoder};
pub use mix::{FrameSource, MixError, Mixer};
pub use stream::{DecodedStream, FramePoll, PcmFrame, TrackStream};
