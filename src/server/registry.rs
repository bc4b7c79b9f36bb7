//! Owns the live voice sessions, one per guild.
//!
//! Commands for the same guild are serialized through a per-guild async lock;
//! different guilds never wait on each other.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::Mixer,
    common::{
        errors::{VoiceError, VoiceResult},
        types::{ChannelId, GuildId, ProducerId},
    },
    gateway::{LoopExit, TransportFactory, VoiceTransport, speak_loop},
    server::now_ms,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DisconnectReason {
    Requested,
    TransportLost,
}

/// Notified when sessions come and go. Callbacks run under the guild's
/// session lock and must not call back into the registry for that guild.
pub trait SessionListener: Send + Sync {
    fn on_connect(&self, session: &SessionHandle);
    fn on_disconnect(&self, guild_id: GuildId, reason: DisconnectReason);
}

/// One active voice connection.
pub struct Session {
    guild_id: GuildId,
    channel_id: ChannelId,
    connected_at: u64,
    transport: Arc<dyn VoiceTransport>,
    mixer: Arc<Mixer>,
    cancel: CancellationToken,
    send_task: Mutex<Option<JoinHandle<()>>>,
}

pub type SessionHandle = Arc<Session>;

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub connected_at: u64,
    pub producers: Vec<ProducerId>,
}

impl Session {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn connected_at(&self) -> u64 {
        self.connected_at
    }

    /// Producers currently registered in this session's mix.
    pub fn producers(&self) -> Vec<ProducerId> {
        self.mixer.producers(&self.guild_id)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            connected_at: self.connected_at,
            producers: self.producers(),
        }
    }
}

pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    locks: DashMap<GuildId, Arc<tokio::sync::Mutex<()>>>,
    mixer: Arc<Mixer>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
    max_send_failures: u32,
}

impl SessionRegistry {
    pub fn new(mixer: Arc<Mixer>, max_send_failures: u32) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            locks: DashMap::new(),
            mixer,
            listeners: RwLock::new(Vec::new()),
            max_send_failures,
        })
    }

    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.write().push(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn SessionListener>> {
        self.listeners.read().clone()
    }

    fn guild_lock(&self, guild_id: GuildId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.entry(guild_id).or_default().clone()
    }

    /// Forgets the guild's lock once no caller holds a clone of it. Must be
    /// called after the caller dropped its own guard and clone.
    fn release_lock(&self, guild_id: GuildId) {
        self.locks
            .remove_if(&guild_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<SessionHandle> {
        self.sessions.get(guild_id).map(|s| s.value().clone())
    }

    pub fn is_connected(&self, guild_id: &GuildId) -> bool {
        self.sessions.contains_key(guild_id)
    }

    pub fn sessions(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    /// Opens a session for `guild_id`, its mix slot and its send loop.
    pub async fn connect(
        self: &Arc<Self>,
        guild_id: GuildId,
        channel_id: ChannelId,
        factory: &dyn TransportFactory,
    ) -> VoiceResult<SessionHandle> {
        let result = self.open_session(guild_id, channel_id, factory).await;
        if result.is_err() {
            self.release_lock(guild_id);
        }
        result
    }

    async fn open_session(
        self: &Arc<Self>,
        guild_id: GuildId,
        channel_id: ChannelId,
        factory: &dyn TransportFactory,
    ) -> VoiceResult<SessionHandle> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        if self.sessions.contains_key(&guild_id) {
            return Err(VoiceError::AlreadyConnected(guild_id));
        }

        let transport: Arc<dyn VoiceTransport> = factory
            .open(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Transport(e.to_string()))?
            .into();

        let session = Arc::new(Session {
            guild_id,
            channel_id,
            connected_at: now_ms(),
            transport: transport.clone(),
            mixer: self.mixer.clone(),
            cancel: CancellationToken::new(),
            send_task: Mutex::new(None),
        });

        self.mixer.open_slot(&guild_id);
        self.sessions.insert(guild_id, session.clone());

        let registry = Arc::downgrade(self);
        let task = tokio::spawn(run_send_loop(
            registry,
            session.clone(),
            self.mixer.clone(),
            transport,
            self.max_send_failures,
        ));
        *session.send_task.lock() = Some(task);

        for listener in self.listeners() {
            listener.on_connect(&session);
        }

        info!("[{}] connected to channel {}", guild_id, channel_id);
        Ok(session)
    }

    /// Ends the session for `guild_id`. Returns `false` when there was none.
    pub async fn disconnect(&self, guild_id: GuildId) -> bool {
        let existed = {
            let lock = self.guild_lock(guild_id);
            let _guard = lock.lock().await;

            match self.sessions.remove(&guild_id) {
                Some((_, session)) => {
                    self.teardown(session, DisconnectReason::Requested).await;
                    true
                }
                None => false,
            }
        };
        self.release_lock(guild_id);
        existed
    }

    /// Tears `session` down after its transport died, unless it was already
    /// replaced or removed.
    async fn drop_lost(&self, session: &SessionHandle) {
        let guild_id = session.guild_id;
        {
            let lock = self.guild_lock(guild_id);
            let _guard = lock.lock().await;

            let removed = self
                .sessions
                .remove_if(&guild_id, |_, s| Arc::ptr_eq(s, session));
            if let Some((_, session)) = removed {
                self.teardown(session, DisconnectReason::TransportLost).await;
            }
        }
        self.release_lock(guild_id);
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }

    async fn teardown(&self, session: SessionHandle, reason: DisconnectReason) {
        let guild_id = session.guild_id;
        session.cancel.cancel();
        session.transport.close().await;

        for listener in self.listeners() {
            listener.on_disconnect(guild_id, reason);
        }
        self.mixer.close_slot(&guild_id);

        match reason {
            DisconnectReason::Requested => info!("[{}] disconnected", guild_id),
            DisconnectReason::TransportLost => warn!("[{}] session dropped: transport lost", guild_id),
        }
    }

    /// Disconnects every session and waits for their send loops to stop.
    pub async fn shutdown(&self) {
        let sessions = self.sessions();
        futures::future::join_all(sessions.iter().map(|s| self.disconnect(s.guild_id))).await;

        let tasks: Vec<_> = sessions
            .iter()
            .filter_map(|s| s.send_task.lock().take())
            .collect();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                debug!("send loop ended abnormally: {}", e);
            }
        }
        info!("all voice sessions closed");
    }
}

async fn run_send_loop(
    registry: Weak<SessionRegistry>,
    session: SessionHandle,
    mixer: Arc<Mixer>,
    transport: Arc<dyn VoiceTransport>,
    max_send_failures: u32,
) {
    let exit = speak_loop(
        session.guild_id,
        mixer,
        transport,
        max_send_failures,
        session.cancel.clone(),
    )
    .await;

    if exit == LoopExit::Cancelled {
        return;
    }
    if let Some(registry) = registry.upgrade() {
        registry.drop_lost(&session).await;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::Ordering, time::Duration};

    use super::*;
    use crate::{
        audio::mix::mixer::tests::pcm_encoder_factory,
        gateway::speak::tests::FakeTransportFactory,
    };

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SessionListener for Recorder {
        fn on_connect(&self, session: &SessionHandle) {
            self.events
                .lock()
                .push(format!("connect {} {}", session.guild_id(), session.channel_id()));
        }

        fn on_disconnect(&self, guild_id: GuildId, reason: DisconnectReason) {
            self.events
                .lock()
                .push(format!("disconnect {} {:?}", guild_id, reason));
        }
    }

    fn registry() -> (Arc<SessionRegistry>, Arc<Recorder>) {
        let registry = SessionRegistry::new(Arc::new(Mixer::new(pcm_encoder_factory())), 3);
        let recorder = Arc::new(Recorder::default());
        registry.subscribe(recorder.clone());
        (registry, recorder)
    }

    const GUILD: GuildId = GuildId(10);

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let (registry, recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();

        let session = registry.connect(GUILD, ChannelId(1), &factory).await.unwrap();
        assert_eq!(session.guild_id(), GUILD);
        assert!(registry.mixer().has_slot(&GUILD));

        let err = registry.connect(GUILD, ChannelId(2), &factory).await.unwrap_err();
        assert!(matches!(err, VoiceError::AlreadyConnected(g) if g == GUILD));
        assert_eq!(registry.get(&GUILD).unwrap().channel_id(), ChannelId(1));
        assert_eq!(*recorder.events.lock(), vec!["connect 10 1".to_string()]);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn disconnect_reports_whether_a_session_existed() {
        let (registry, recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();
        assert!(!registry.disconnect(GUILD).await);

        registry.connect(GUILD, ChannelId(1), &factory).await.unwrap();
        assert!(registry.disconnect(GUILD).await);
        assert!(!registry.disconnect(GUILD).await);

        assert!(registry.get(&GUILD).is_none());
        assert!(!registry.mixer().has_slot(&GUILD));
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
        assert_eq!(
            *recorder.events.lock(),
            vec!["connect 10 1".to_string(), "disconnect 10 Requested".to_string()]
        );
    }

    #[tokio::test]
    async fn guild_locks_are_released_with_their_sessions() {
        let (registry, _recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();

        registry.connect(GuildId(1), ChannelId(1), &factory).await.unwrap();
        registry.connect(GuildId(2), ChannelId(2), &factory).await.unwrap();
        assert_eq!(registry.lock_count(), 2);

        registry.disconnect(GuildId(1)).await;
        assert_eq!(registry.lock_count(), 1);
        assert!(!registry.disconnect(GuildId(3)).await);
        assert_eq!(registry.lock_count(), 1);

        factory.refuse.store(true, Ordering::SeqCst);
        registry.connect(GuildId(4), ChannelId(4), &factory).await.unwrap_err();
        assert_eq!(registry.lock_count(), 1);

        registry.shutdown().await;
        assert_eq!(registry.lock_count(), 0);
    }

    #[tokio::test]
    async fn a_held_guild_lock_is_not_released() {
        let (registry, _recorder) = registry();
        let held = registry.guild_lock(GUILD);
        registry.release_lock(GUILD);
        assert_eq!(registry.lock_count(), 1);

        drop(held);
        registry.release_lock(GUILD);
        assert_eq!(registry.lock_count(), 0);
    }

    #[tokio::test]
    async fn sessions_print_their_identity() {
        let (registry, _recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();
        let session = registry.connect(GUILD, ChannelId(5), &factory).await.unwrap();

        let printed = format!("{:?}", session);
        assert!(printed.starts_with("Session { guild_id: "));
        assert!(printed.ends_with(".. }"));

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn failed_transport_leaves_nothing_behind() {
        let (registry, recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();
        factory.refuse.store(true, Ordering::SeqCst);

        let err = registry.connect(GUILD, ChannelId(1), &factory).await.unwrap_err();
        assert!(matches!(err, VoiceError::Transport(_)));
        assert!(!registry.is_connected(&GUILD));
        assert!(!registry.mixer().has_slot(&GUILD));
        assert!(recorder.events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_loss_tears_the_session_down() {
        let (registry, recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();
        registry.connect(GUILD, ChannelId(1), &factory).await.unwrap();

        factory.broken.store(true, Ordering::SeqCst);
        for _ in 0..50 {
            if !registry.is_connected(&GUILD) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(!registry.is_connected(&GUILD));
        assert!(!registry.mixer().has_slot(&GUILD));
        assert_eq!(
            recorder.events.lock().last().unwrap(),
            "disconnect 10 TransportLost"
        );

        factory.broken.store(false, Ordering::SeqCst);
        registry.connect(GUILD, ChannelId(3), &factory).await.unwrap();
        assert_eq!(registry.get(&GUILD).unwrap().channel_id(), ChannelId(3));
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let (registry, _recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();
        registry.connect(GuildId(1), ChannelId(1), &factory).await.unwrap();
        registry.connect(GuildId(2), ChannelId(2), &factory).await.unwrap();
        assert_eq!(registry.sessions().len(), 2);

        registry.disconnect(GuildId(1)).await;
        assert!(registry.is_connected(&GuildId(2)));
        assert!(registry.mixer().has_slot(&GuildId(2)));

        registry.shutdown().await;
        assert!(registry.sessions().is_empty());
    }

    #[tokio::test]
    async fn info_lists_registered_producers() {
        let (registry, _recorder) = registry();
        let (factory, _rx) = FakeTransportFactory::new();
        let session = registry.connect(GUILD, ChannelId(4), &factory).await.unwrap();
        assert!(session.info().producers.is_empty());

        struct Quiet;
        impl crate::audio::FrameSource for Quiet {
            fn pull(&self) -> Result<Option<crate::audio::PcmFrame>, crate::audio::MixError> {
                Ok(None)
            }
        }
        registry
            .mixer()
            .register_producer(&GUILD, ProducerId::SPEECH, Arc::new(Quiet));
        assert_eq!(session.info().producers, vec![ProducerId::SPEECH]);

        registry.shutdown().await;
    }
}
