use async_trait::async_trait;
use thiserror::Error;

use crate::{
    audio::codec::EncodedFrame,
    common::types::{ChannelId, GuildId},
};

#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection is gone for good; the session must be torn down.
    #[error("transport closed")]
    Closed,
    #[error("send failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not open transport: {0}")]
    Open(String),
}

impl TransportError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Outbound audio connection for one session.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Sends one frame. `None` marks a tick with nothing to play.
    async fn send(&self, frame: Option<&EncodedFrame>) -> Result<(), TransportError>;

    async fn close(&self);
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceTransport>, TransportError>;
}
