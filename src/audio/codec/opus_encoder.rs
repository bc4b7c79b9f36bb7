use audiopus::{Application, Bitrate, Channels, SampleRate, coder::Encoder as OpusEncoder};
use bytes::Bytes;

use super::{CodecError, EncodedFrame, FrameEncoder};
use crate::audio::constants::{FRAME_SIZE_SAMPLES, MAX_OPUS_PACKET_BYTES};

/// 48 kHz stereo Opus encoder for 20 ms frames.
pub struct OpusFrameEncoder {
    encoder: OpusEncoder,
    out: Vec<u8>,
}

impl OpusFrameEncoder {
    pub fn new() -> Result<Self, CodecError> {
        let mut encoder =
            OpusEncoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
                .map_err(|e| CodecError::Opus(e.to_string()))?;
        encoder
            .set_bitrate(Bitrate::Auto)
            .map_err(|e| CodecError::Opus(e.to_string()))?;
        Ok(Self {
            encoder,
            out: vec![0u8; MAX_OPUS_PACKET_BYTES],
        })
    }
}

impl FrameEncoder for OpusFrameEncoder {
    fn encode(&mut self, pcm: &[i16]) -> Result<EncodedFrame, CodecError> {
        if pcm.len() != FRAME_SIZE_SAMPLES {
            return Err(CodecError::FrameSize {
                got: pcm.len(),
                expected: FRAME_SIZE_SAMPLES,
            });
        }
        let size = self
            .encoder
            .encode(pcm, &mut self.out)
            .map_err(|e| CodecError::Opus(e.to_string()))?;
        Ok(EncodedFrame(Bytes::copy_from_slice(&self.out[..size])))
    }
}
