use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::{
    audio::Mixer,
    common::{
        errors::{VoiceError, VoiceResult},
        types::{GuildId, ProducerId, RoleId, UserId},
    },
    features::{log_events, toggled},
    player::{
        PendingLoad, PlaybackState, ProducerBinding, SchedulerSnapshot, TrackInfo, TrackScheduler,
    },
    server::{DisconnectReason, SessionHandle, SessionListener},
    sources::TrackResolver,
    store::ConfigStore,
};

/// The music queue of every connected guild.
pub struct MusicService {
    mixer: Arc<Mixer>,
    resolver: Arc<dyn TrackResolver>,
    store: Arc<dyn ConfigStore>,
    default_volume: u8,
    bindings: DashMap<GuildId, Arc<ProducerBinding>>,
}

impl MusicService {
    pub fn new(
        mixer: Arc<Mixer>,
        resolver: Arc<dyn TrackResolver>,
        store: Arc<dyn ConfigStore>,
        default_volume: u8,
    ) -> Self {
        Self {
            mixer,
            resolver,
            store,
            default_volume,
            bindings: DashMap::new(),
        }
    }

    /// Binding of a connected guild whose music feature is on.
    async fn binding(&self, guild_id: GuildId) -> VoiceResult<Arc<ProducerBinding>> {
        let binding = self
            .bindings
            .get(&guild_id)
            .map(|b| b.value().clone())
            .ok_or(VoiceError::NotConnected(guild_id))?;
        if !self.store.guild(guild_id).await?.music {
            return Err(VoiceError::FeatureDisabled("music"));
        }
        Ok(binding)
    }

    /// Starts resolving `query` in the background and returns once the
    /// command is accepted. The track is queued when the load completes; a
    /// failed load is logged and leaves the queue untouched.
    pub async fn play(
        &self,
        guild_id: GuildId,
        query: &str,
        requester: UserId,
    ) -> VoiceResult<PendingLoad> {
        let binding = self.binding(guild_id).await?;
        Ok(binding.load(query, requester))
    }

    pub async fn skip(&self, guild_id: GuildId) -> VoiceResult<Option<TrackInfo>> {
        let binding = self.binding(guild_id).await?;
        Ok(binding.with_scheduler(|s| s.skip()))
    }

    /// Removes the queued track at 1-based `position`.
    pub async fn remove(&self, guild_id: GuildId, position: i64) -> VoiceResult<TrackInfo> {
        let binding = self.binding(guild_id).await?;
        binding
            .with_scheduler(|s| s.remove_at(position))
            .map(|entry| entry.info)
    }

    pub async fn clear(&self, guild_id: GuildId) -> VoiceResult<()> {
        let binding = self.binding(guild_id).await?;
        binding.with_scheduler(|s| s.clear());
        Ok(())
    }

    pub async fn set_paused(&self, guild_id: GuildId, paused: bool) -> VoiceResult<PlaybackState> {
        let binding = self.binding(guild_id).await?;
        Ok(binding.with_scheduler(|s| {
            s.set_paused(paused);
            s.state()
        }))
    }

    /// Flips looping of the current track. Returns the new flag.
    pub async fn toggle_loop(&self, guild_id: GuildId) -> VoiceResult<bool> {
        let binding = self.binding(guild_id).await?;
        binding.with_scheduler(|s| {
            if s.current().is_none() {
                return Err(VoiceError::NoCurrentTrack);
            }
            Ok(s.toggle_loop())
        })
    }

    pub async fn set_volume(&self, guild_id: GuildId, volume: i64) -> VoiceResult<()> {
        let binding = self.binding(guild_id).await?;
        binding.with_scheduler(|s| s.set_volume(volume))
    }

    pub async fn seek(&self, guild_id: GuildId, position_ms: i64) -> VoiceResult<()> {
        let binding = self.binding(guild_id).await?;
        binding.with_scheduler(|s| s.seek(position_ms))
    }

    pub async fn queue(&self, guild_id: GuildId) -> VoiceResult<SchedulerSnapshot> {
        let binding = self.binding(guild_id).await?;
        Ok(binding.snapshot())
    }

    /// Turns music on or off for a guild; `None` flips the current value.
    pub async fn set_enabled(&self, guild_id: GuildId, value: Option<bool>) -> VoiceResult<bool> {
        let settings = self
            .store
            .update_guild(guild_id, Box::new(move |s| s.music = toggled(s.music, value)))
            .await?;
        Ok(settings.music)
    }

    pub async fn set_dj_only(&self, guild_id: GuildId, value: Option<bool>) -> VoiceResult<bool> {
        let settings = self
            .store
            .update_guild(guild_id, Box::new(move |s| s.dj_only = toggled(s.dj_only, value)))
            .await?;
        Ok(settings.dj_only)
    }

    pub async fn set_dj_role(&self, guild_id: GuildId, role: Option<RoleId>) -> VoiceResult<()> {
        self.store
            .update_guild(guild_id, Box::new(move |s| s.dj_role = role))
            .await?;
        Ok(())
    }
}

impl SessionListener for MusicService {
    fn on_connect(&self, session: &SessionHandle) {
        let guild_id = session.guild_id();
        let label = format!("{}/{}", guild_id, ProducerId::MUSIC);

        let mut scheduler = TrackScheduler::new(label.clone(), self.default_volume);
        tokio::spawn(log_events(label, scheduler.subscribe()));

        let binding = ProducerBinding::attach(
            guild_id,
            ProducerId::MUSIC,
            scheduler,
            self.mixer.clone(),
            self.resolver.clone(),
        );
        if let Some(stale) = self.bindings.insert(guild_id, binding) {
            stale.teardown();
        }
        info!("[{}] music ready", guild_id);
    }

    fn on_disconnect(&self, guild_id: GuildId, _reason: DisconnectReason) {
        if let Some((_, binding)) = self.bindings.remove(&guild_id) {
            binding.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::{
        audio::mix::mixer::tests::pcm_encoder_factory,
        common::types::ChannelId,
        gateway::speak::tests::FakeTransportFactory,
        player::binding::tests::FakeResolver,
        server::SessionRegistry,
        store::JsonConfigStore,
    };

    const GUILD: GuildId = GuildId(77);

    struct Harness {
        registry: Arc<SessionRegistry>,
        music: Arc<MusicService>,
        factory: FakeTransportFactory,
    }

    impl Harness {
        fn new() -> Self {
            Self::gated(None)
        }

        fn gated(gate: Option<Arc<Notify>>) -> Self {
            let mixer = Arc::new(Mixer::new(pcm_encoder_factory()));
            let registry = SessionRegistry::new(mixer.clone(), 3);
            let music = Arc::new(MusicService::new(
                mixer,
                Arc::new(FakeResolver { gate }),
                Arc::new(JsonConfigStore::in_memory()),
                80,
            ));
            registry.subscribe(music.clone());
            let (factory, _rx) = FakeTransportFactory::new();
            Self {
                registry,
                music,
                factory,
            }
        }

        async fn connect(&self) {
            self.registry
                .connect(GUILD, ChannelId(1), &self.factory)
                .await
                .unwrap();
        }

        /// Plays `query` and waits for it to be queued.
        async fn play(&self, query: &str, requester: UserId) -> VoiceResult<TrackInfo> {
            self.music.play(GUILD, query, requester).await?.outcome().await
        }
    }

    #[tokio::test]
    async fn commands_need_a_session() {
        let h = Harness::new();
        let err = h.music.play(GUILD, "song", UserId(1)).await.unwrap_err();
        assert!(matches!(err, VoiceError::NotConnected(g) if g == GUILD));
        assert!(matches!(h.music.queue(GUILD).await, Err(VoiceError::NotConnected(_))));
    }

    #[tokio::test]
    async fn connect_registers_the_music_producer() {
        let h = Harness::new();
        h.connect().await;
        assert_eq!(h.registry.mixer().producers(&GUILD), vec![ProducerId::MUSIC]);

        let queue = h.music.queue(GUILD).await.unwrap();
        assert_eq!(queue.state, PlaybackState::Idle);
        assert_eq!(queue.volume, 80);
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn play_and_queue_management() {
        let h = Harness::new();
        h.connect().await;

        let first = h.play("first", UserId(1)).await.unwrap();
        assert_eq!(first.title, "first");
        h.play("second", UserId(1)).await.unwrap();
        h.play("third", UserId(2)).await.unwrap();

        let queue = h.music.queue(GUILD).await.unwrap();
        assert_eq!(queue.current.unwrap().title, "first");
        assert_eq!(queue.queue.len(), 2);

        let removed = h.music.remove(GUILD, 2).await.unwrap();
        assert_eq!(removed.title, "third");
        assert!(matches!(
            h.music.remove(GUILD, 2).await,
            Err(VoiceError::OutOfRange { .. })
        ));

        let skipped = h.music.skip(GUILD).await.unwrap().unwrap();
        assert_eq!(skipped.title, "first");
        assert_eq!(
            h.music.queue(GUILD).await.unwrap().current.unwrap().title,
            "second"
        );

        h.music.clear(GUILD).await.unwrap();
        assert_eq!(h.music.queue(GUILD).await.unwrap().state, PlaybackState::Idle);
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn play_returns_while_the_load_is_in_flight() {
        let gate = Arc::new(Notify::new());
        let h = Harness::gated(Some(gate.clone()));
        h.connect().await;

        let pending = tokio::time::timeout(
            Duration::from_millis(200),
            h.music.play(GUILD, "slow", UserId(1)),
        )
        .await
        .expect("play waited for the load")
        .unwrap();
        assert!(!pending.is_finished());
        assert_eq!(h.music.queue(GUILD).await.unwrap().state, PlaybackState::Idle);

        gate.notify_one();
        assert_eq!(pending.outcome().await.unwrap().title, "slow");
        assert_eq!(
            h.music.queue(GUILD).await.unwrap().current.unwrap().title,
            "slow"
        );
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn failed_load_is_reported() {
        let h = Harness::new();
        h.connect().await;
        let err = h.play("missing", UserId(1)).await.unwrap_err();
        assert!(matches!(err, VoiceError::LoadFailure(_)));
        assert_eq!(h.music.queue(GUILD).await.unwrap().state, PlaybackState::Idle);
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn playback_controls() {
        let h = Harness::new();
        h.connect().await;

        assert!(matches!(
            h.music.toggle_loop(GUILD).await,
            Err(VoiceError::NoCurrentTrack)
        ));
        assert_eq!(h.music.set_paused(GUILD, true).await.unwrap(), PlaybackState::Idle);

        h.play("song", UserId(1)).await.unwrap();
        assert!(h.music.toggle_loop(GUILD).await.unwrap());
        assert_eq!(h.music.set_paused(GUILD, true).await.unwrap(), PlaybackState::Paused);
        assert_eq!(h.music.set_paused(GUILD, false).await.unwrap(), PlaybackState::Playing);

        assert!(matches!(
            h.music.set_volume(GUILD, 101).await,
            Err(VoiceError::OutOfRange { .. })
        ));
        h.music.set_volume(GUILD, 30).await.unwrap();
        h.music.seek(GUILD, 500).await.unwrap();
        assert!(matches!(
            h.music.seek(GUILD, 5_000).await,
            Err(VoiceError::OutOfRange { .. })
        ));

        let queue = h.music.queue(GUILD).await.unwrap();
        assert_eq!(queue.volume, 30);
        assert!(queue.looping);
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn disabled_music_rejects_commands() {
        let h = Harness::new();
        h.connect().await;

        assert!(!h.music.set_enabled(GUILD, None).await.unwrap());
        let err = h.music.play(GUILD, "song", UserId(1)).await.unwrap_err();
        assert!(matches!(err, VoiceError::FeatureDisabled("music")));

        assert!(h.music.set_enabled(GUILD, Some(true)).await.unwrap());
        h.play("song", UserId(1)).await.unwrap();
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn dj_settings_are_stored() {
        let h = Harness::new();
        assert!(h.music.set_dj_only(GUILD, None).await.unwrap());
        h.music.set_dj_role(GUILD, Some(RoleId(5))).await.unwrap();

        let settings = h.music.store.guild(GUILD).await.unwrap();
        assert!(settings.dj_only);
        assert_eq!(settings.dj_role, Some(RoleId(5)));
    }

    #[tokio::test]
    async fn disconnect_tears_the_binding_down() {
        let h = Harness::new();
        h.connect().await;
        h.play("song", UserId(1)).await.unwrap();

        assert!(h.registry.disconnect(GUILD).await);
        assert!(h.registry.mixer().producers(&GUILD).is_empty());
        assert!(matches!(
            h.music.skip(GUILD).await,
            Err(VoiceError::NotConnected(_))
        ));
    }
}
