use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    audio::{
        Mixer,
        codec::EncodedFrame,
        constants::{FRAME_DURATION_MS, MAX_SILENCE_FRAMES},
    },
    common::types::GuildId,
    gateway::transport::VoiceTransport,
};

/// Why a send loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    TransportLost(String),
}

/// Pulls one mixed frame per 20 ms tick and hands it to the transport.
///
/// After the mix goes quiet a few silence frames are sent so the far end can
/// flush its jitter buffer; after that, ticks carry nothing. A closed transport
/// or `max_send_failures` consecutive send errors end the loop.
pub async fn speak_loop(
    guild_id: GuildId,
    mixer: Arc<Mixer>,
    transport: Arc<dyn VoiceTransport>,
    max_send_failures: u32,
    cancel_token: CancellationToken,
) -> LoopExit {
    let mut interval = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let silence = EncodedFrame::silence();
    let mut silence_frames = MAX_SILENCE_FRAMES;
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!("[{}] send loop cancelled", guild_id);
                return LoopExit::Cancelled;
            }
            _ = interval.tick() => {}
        }

        let outgoing = match mixer.tick(&guild_id) {
            Some(frame) => {
                silence_frames = 0;
                Some(frame)
            }
            None if silence_frames < MAX_SILENCE_FRAMES => {
                silence_frames += 1;
                Some(silence.clone())
            }
            None => None,
        };

        match transport.send(outgoing.as_ref()).await {
            Ok(()) => failures = 0,
            Err(e) if e.is_fatal() => {
                warn!("[{}] voice transport lost: {}", guild_id, e);
                return LoopExit::TransportLost(e.to_string());
            }
            Err(e) => {
                failures += 1;
                if failures >= max_send_failures.max(1) {
                    warn!(
                        "[{}] giving up after {} failed sends: {}",
                        guild_id, failures, e
                    );
                    return LoopExit::TransportLost(e.to_string());
                }
                debug!("[{}] send failed ({}): {}", guild_id, failures, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::{
        audio::{
            constants::FRAME_SIZE_SAMPLES,
            mix::{FrameSource, MixError, mixer::tests::pcm_encoder_factory},
            stream::PcmFrame,
        },
        common::types::{ChannelId, ProducerId},
        gateway::transport::{TransportError, TransportFactory},
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Sent {
        Frame(Bytes),
        Nothing,
    }

    /// Records every send on a channel. Fails with `Closed` once `broken` is
    /// set, and with an I/O error while `flaky` is set.
    pub(crate) struct FakeTransport {
        pub sent: flume::Sender<Sent>,
        pub broken: Arc<AtomicBool>,
        pub flaky: Arc<AtomicBool>,
        pub closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VoiceTransport for FakeTransport {
        async fn send(&self, frame: Option<&EncodedFrame>) -> Result<(), TransportError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            if self.flaky.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("network unreachable").into());
            }
            let _ = self.sent.send(match frame {
                Some(f) => Sent::Frame(f.0.clone()),
                None => Sent::Nothing,
            });
            Ok(())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Hands out [`FakeTransport`]s sharing the same switches.
    #[derive(Clone)]
    pub(crate) struct FakeTransportFactory {
        pub sent: flume::Sender<Sent>,
        pub broken: Arc<AtomicBool>,
        pub flaky: Arc<AtomicBool>,
        pub closes: Arc<AtomicUsize>,
        pub refuse: Arc<AtomicBool>,
    }

    impl FakeTransportFactory {
        pub(crate) fn new() -> (Self, flume::Receiver<Sent>) {
            let (sent, rx) = flume::unbounded();
            let factory = Self {
                sent,
                broken: Arc::default(),
                flaky: Arc::default(),
                closes: Arc::default(),
                refuse: Arc::default(),
            };
            (factory, rx)
        }

        pub(crate) fn transport(&self) -> FakeTransport {
            FakeTransport {
                sent: self.sent.clone(),
                broken: self.broken.clone(),
                flaky: self.flaky.clone(),
                closes: self.closes.clone(),
            }
        }
    }

    #[async_trait]
    impl TransportFactory for FakeTransportFactory {
        async fn open(
            &self,
            _guild_id: GuildId,
            _channel_id: ChannelId,
        ) -> Result<Box<dyn VoiceTransport>, TransportError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Open("refused".into()));
            }
            Ok(Box::new(self.transport()))
        }
    }

    /// Plays `frames` frames of a constant sample, then goes quiet.
    struct Burst {
        left: AtomicU32,
    }

    impl FrameSource for Burst {
        fn pull(&self) -> Result<Option<PcmFrame>, MixError> {
            let left = self.left.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(None);
            }
            self.left.store(left - 1, Ordering::SeqCst);
            Ok(Some(vec![1; FRAME_SIZE_SAMPLES]))
        }
    }

    const GUILD: GuildId = GuildId(5);

    #[tokio::test(start_paused = true)]
    async fn audio_is_followed_by_bounded_silence() {
        let mixer = Arc::new(Mixer::new(pcm_encoder_factory()));
        mixer.register_producer(
            &GUILD,
            ProducerId::MUSIC,
            Arc::new(Burst {
                left: AtomicU32::new(3),
            }),
        );
        let (factory, rx) = FakeTransportFactory::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(speak_loop(
            GUILD,
            mixer,
            Arc::new(factory.transport()),
            3,
            cancel.clone(),
        ));

        let mut sent = Vec::new();
        for _ in 0..10 {
            sent.push(rx.recv_async().await.unwrap());
        }
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), LoopExit::Cancelled);

        let silence = Sent::Frame(EncodedFrame::silence().0);
        for frame in &sent[..3] {
            assert!(matches!(frame, Sent::Frame(b) if b.len() == FRAME_SIZE_SAMPLES * 2));
        }
        assert!(sent[3..8].iter().all(|s| *s == silence));
        assert!(sent[8..].iter().all(|s| *s == Sent::Nothing));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_sends_nothing() {
        let mixer = Arc::new(Mixer::new(pcm_encoder_factory()));
        let (factory, rx) = FakeTransportFactory::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(speak_loop(
            GUILD,
            mixer,
            Arc::new(factory.transport()),
            3,
            cancel.clone(),
        ));

        assert_eq!(rx.recv_async().await.unwrap(), Sent::Nothing);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_transport_ends_the_loop() {
        let mixer = Arc::new(Mixer::new(pcm_encoder_factory()));
        let (factory, _rx) = FakeTransportFactory::new();
        factory.broken.store(true, Ordering::SeqCst);

        let exit = speak_loop(
            GUILD,
            mixer,
            Arc::new(factory.transport()),
            3,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(exit, LoopExit::TransportLost(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_send_errors_end_the_loop() {
        let mixer = Arc::new(Mixer::new(pcm_encoder_factory()));
        let (factory, rx) = FakeTransportFactory::new();
        factory.flaky.store(true, Ordering::SeqCst);

        let exit = speak_loop(
            GUILD,
            mixer,
            Arc::new(factory.transport()),
            4,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(exit, LoopExit::TransportLost(m) if m.contains("unreachable")));
        assert!(rx.is_empty());
    }
}
