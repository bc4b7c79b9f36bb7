pub mod mixer;
pub mod slot;

pub use mixer::{FrameSource, Mixer};

use thiserror::Error;

use crate::{audio::codec::CodecError, common::types::ProducerId};

/// Failures confined to a single mixer tick.
#[derive(Debug, Error)]
pub enum MixError {
    #[error("producer {0} failed: {1}")]
    Producer(ProducerId, String),
    #[error("producer {0} panicked")]
    ProducerPanic(ProducerId),
    #[error("encoder panicked")]
    EncoderPanic,
    #[error(transparent)]
    Codec(#[from] CodecError),
}
