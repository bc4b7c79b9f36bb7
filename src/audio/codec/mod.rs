pub mod opus_encoder;

pub use opus_encoder::OpusFrameEncoder;

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("opus: {0}")]
    Opus(String),
    #[error("frame has {got} samples, expected {expected}")]
    FrameSize { got: usize, expected: usize },
}

/// One compressed 20 ms packet ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame(pub Bytes);

impl EncodedFrame {
    pub fn silence() -> Self {
        Self(Bytes::from_static(&crate::audio::constants::SILENCE_FRAME))
    }
}

impl std::ops::Deref for EncodedFrame {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Stateful PCM-to-packet encoder. One instance lives in each mix slot.
pub trait FrameEncoder: Send {
    fn encode(&mut self, pcm: &[i16]) -> Result<EncodedFrame, CodecError>;
}

pub type EncoderFactory = Arc<dyn Fn() -> Result<Box<dyn FrameEncoder>, CodecError> + Send + Sync>;

pub fn opus_encoder_factory() -> EncoderFactory {
    Arc::new(|| Ok(Box::new(OpusFrameEncoder::new()?) as Box<dyn FrameEncoder>))
}
