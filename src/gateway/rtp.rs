use std::{
    io::Write,
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use byteorder::{BigEndian, WriteBytesExt};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::{
    audio::codec::EncodedFrame,
    common::types::{ChannelId, GuildId},
    gateway::{
        constants::{RTP_HEADER_LEN, RTP_OPUS_PAYLOAD_TYPE, RTP_TIMESTAMP_STEP, RTP_VERSION_BYTE},
        transport::{TransportError, TransportFactory, VoiceTransport},
    },
};

/// Sequence and timestamp bookkeeping for one RTP stream.
pub struct RtpPacketizer {
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpPacketizer {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    pub fn packetize(&mut self, payload: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut packet = Vec::with_capacity(RTP_HEADER_LEN + payload.len());
        packet.write_u8(RTP_VERSION_BYTE)?;
        packet.write_u8(RTP_OPUS_PAYLOAD_TYPE)?;
        packet.write_u16::<BigEndian>(self.sequence)?;
        packet.write_u32::<BigEndian>(self.timestamp)?;
        packet.write_u32::<BigEndian>(self.ssrc)?;
        packet.write_all(payload)?;

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(RTP_TIMESTAMP_STEP);
        Ok(packet)
    }
}

/// Plain RTP/UDP sender. Silent ticks send nothing.
pub struct RtpTransport {
    socket: UdpSocket,
    endpoint: SocketAddr,
    packetizer: Mutex<RtpPacketizer>,
    closed: AtomicBool,
}

impl RtpTransport {
    pub async fn connect(endpoint: SocketAddr, ssrc: u32) -> Result<Self, TransportError> {
        let bind: SocketAddr = if endpoint.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        Ok(Self {
            socket,
            endpoint,
            packetizer: Mutex::new(RtpPacketizer::new(ssrc)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl VoiceTransport for RtpTransport {
    async fn send(&self, frame: Option<&EncodedFrame>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let Some(frame) = frame else {
            return Ok(());
        };
        let packet = self.packetizer.lock().packetize(frame)?;
        self.socket.send_to(&packet, self.endpoint).await?;
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("RTP stream to {} closed", self.endpoint);
        }
    }
}

/// Opens one RTP stream per session towards a fixed endpoint.
pub struct RtpTransportFactory {
    endpoint: String,
}

impl RtpTransportFactory {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    async fn resolve_endpoint(&self) -> Result<SocketAddr, TransportError> {
        if let Ok(addr) = self.endpoint.parse() {
            return Ok(addr);
        }
        tokio::net::lookup_host(&self.endpoint)
            .await?
            .next()
            .ok_or_else(|| TransportError::Open(format!("{} did not resolve", self.endpoint)))
    }
}

#[async_trait]
impl TransportFactory for RtpTransportFactory {
    async fn open(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceTransport>, TransportError> {
        let endpoint = self.resolve_endpoint().await?;
        let ssrc = rand::random::<u32>();
        let transport = RtpTransport::connect(endpoint, ssrc).await?;
        info!(
            "[{}] RTP stream for channel {} -> {} (ssrc {})",
            guild_id, channel_id, endpoint, ssrc
        );
        Ok(Box::new(transport))
    }
}
