use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    audio::Mixer,
    common::{
        errors::{VoiceError, VoiceResult},
        types::{ChannelId, GuildId, ProducerId, UserId},
    },
    features::{log_events, toggled},
    player::{PendingLoad, ProducerBinding, SchedulerSnapshot, TrackInfo, TrackScheduler},
    server::{DisconnectReason, SessionHandle, SessionListener},
    sources::{ResolvedTrack, TrackResolver},
    store::{ChannelLink, ConfigStore},
    tts::Synthesizer,
};

/// Plain queries are spoken with the default voice.
struct DefaultVoice(Arc<dyn Synthesizer>);

#[async_trait]
impl TrackResolver for DefaultVoice {
    async fn resolve(&self, query: &str) -> VoiceResult<ResolvedTrack> {
        self.0.synthesize(query, self.0.default_voice()).await
    }
}

struct SpeechBinding {
    binding: Arc<ProducerBinding>,
    voice_channel: ChannelId,
}

/// Text-to-speech queue of every connected guild.
pub struct SpeechService {
    mixer: Arc<Mixer>,
    synthesizer: Arc<dyn Synthesizer>,
    store: Arc<dyn ConfigStore>,
    default_volume: u8,
    bindings: DashMap<GuildId, SpeechBinding>,
}

impl SpeechService {
    pub fn new(
        mixer: Arc<Mixer>,
        synthesizer: Arc<dyn Synthesizer>,
        store: Arc<dyn ConfigStore>,
        default_volume: u8,
    ) -> Self {
        Self {
            mixer,
            synthesizer,
            store,
            default_volume,
            bindings: DashMap::new(),
        }
    }

    fn binding(&self, guild_id: GuildId) -> VoiceResult<Arc<ProducerBinding>> {
        self.bindings
            .get(&guild_id)
            .map(|b| b.binding.clone())
            .ok_or(VoiceError::NotConnected(guild_id))
    }

    /// Speaks `text` in `member`'s voice. Synthesis runs in the background;
    /// the returned load resolves once the clip is queued.
    pub async fn speak(
        &self,
        guild_id: GuildId,
        member: UserId,
        text: &str,
    ) -> VoiceResult<PendingLoad> {
        let binding = self.binding(guild_id)?;
        if !self.store.guild(guild_id).await?.tts {
            return Err(VoiceError::FeatureDisabled("tts"));
        }
        let settings = self.store.member(member).await?;
        if !settings.tts {
            return Err(VoiceError::FeatureDisabled("tts for this member"));
        }

        let voice = settings
            .voice
            .unwrap_or_else(|| self.synthesizer.default_voice().to_string());
        let synthesizer = self.synthesizer.clone();
        let text = text.to_string();
        Ok(binding.load_with(member, async move { synthesizer.synthesize(&text, &voice).await }))
    }

    /// Speaks a chat message if its text channel is linked to the voice
    /// channel of the guild's session. Returns `None` when it is not.
    pub async fn handle_message(
        &self,
        guild_id: GuildId,
        text_channel: ChannelId,
        member: UserId,
        text: &str,
    ) -> VoiceResult<Option<PendingLoad>> {
        let Some(voice_channel) = self.bindings.get(&guild_id).map(|b| b.voice_channel) else {
            return Ok(None);
        };
        let linked = self.store.links(guild_id).await?.iter().any(|l| {
            l.text_channel_id == text_channel && l.voice_channel_id == voice_channel
        });
        if !linked {
            debug!("[{}] ignoring message from unlinked channel {}", guild_id, text_channel);
            return Ok(None);
        }
        self.speak(guild_id, member, text).await.map(Some)
    }

    pub fn skip(&self, guild_id: GuildId) -> VoiceResult<Option<TrackInfo>> {
        Ok(self.binding(guild_id)?.with_scheduler(|s| s.skip()))
    }

    /// Stops speaking and drops every pending message.
    pub fn stop(&self, guild_id: GuildId) -> VoiceResult<()> {
        self.binding(guild_id)?.with_scheduler(|s| s.clear());
        Ok(())
    }

    pub fn queue(&self, guild_id: GuildId) -> VoiceResult<SchedulerSnapshot> {
        Ok(self.binding(guild_id)?.snapshot())
    }

    pub async fn set_enabled(&self, guild_id: GuildId, value: Option<bool>) -> VoiceResult<bool> {
        let settings = self
            .store
            .update_guild(guild_id, Box::new(move |s| s.tts = toggled(s.tts, value)))
            .await?;
        Ok(settings.tts)
    }

    pub async fn set_member_enabled(&self, member: UserId, value: Option<bool>) -> VoiceResult<bool> {
        let settings = self
            .store
            .update_member(member, Box::new(move |s| s.tts = toggled(s.tts, value)))
            .await?;
        Ok(settings.tts)
    }

    /// Stores `member`'s preferred voice; `None` resets it to the default.
    pub async fn set_voice(&self, member: UserId, voice: Option<&str>) -> VoiceResult<String> {
        let voice = voice
            .map(|code| self.synthesizer.validate_voice(code))
            .transpose()?;
        let stored = voice.map(str::to_string);
        self.store
            .update_member(member, Box::new(move |s| s.voice = stored))
            .await?;
        Ok(match voice {
            Some(code) => code.to_string(),
            None => self.synthesizer.default_voice().to_string(),
        })
    }

    /// The voice `member` speaks with.
    pub async fn voice_of(&self, member: UserId) -> VoiceResult<String> {
        Ok(self
            .store
            .member(member)
            .await?
            .voice
            .unwrap_or_else(|| self.synthesizer.default_voice().to_string()))
    }

    pub async fn link(
        &self,
        guild_id: GuildId,
        text_channel_id: ChannelId,
        voice_channel_id: ChannelId,
    ) -> VoiceResult<ChannelLink> {
        let link = ChannelLink {
            guild_id,
            text_channel_id,
            voice_channel_id,
        };
        self.store.link(link).await?;
        info!("[{}] linked text channel {} to {}", guild_id, text_channel_id, voice_channel_id);
        Ok(link)
    }

    pub async fn unlink(&self, guild_id: GuildId, text_channel_id: ChannelId) -> VoiceResult<bool> {
        self.store.unlink(guild_id, text_channel_id).await
    }

    pub async fn links(&self, guild_id: GuildId) -> VoiceResult<Vec<ChannelLink>> {
        self.store.links(guild_id).await
    }
}

impl SessionListener for SpeechService {
    fn on_connect(&self, session: &SessionHandle) {
        let guild_id = session.guild_id();
        let label = format!("{}/{}", guild_id, ProducerId::SPEECH);

        let mut scheduler = TrackScheduler::new(label.clone(), self.default_volume);
        tokio::spawn(log_events(label, scheduler.subscribe()));

        let binding = ProducerBinding::attach(
            guild_id,
            ProducerId::SPEECH,
            scheduler,
            self.mixer.clone(),
            Arc::new(DefaultVoice(self.synthesizer.clone())),
        );
        let entry = SpeechBinding {
            binding,
            voice_channel: session.channel_id(),
        };
        if let Some(stale) = self.bindings.insert(guild_id, entry) {
            stale.binding.teardown();
        }
    }

    fn on_disconnect(&self, guild_id: GuildId, _reason: DisconnectReason) {
        if let Some((_, entry)) = self.bindings.remove(&guild_id) {
            entry.binding.teardown();
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
        gateway::speak::tests::FakeTransportFactory,
        player::PlaybackState,
        server::SessionRegistry,
        store::JsonConfigStore,
        tts::tests::FakeSynthesizer,
    };

    const GUILD: GuildId = GuildId(3);
    const VOICE: ChannelId = ChannelId(30);
    const TEXT: ChannelId = ChannelId(31);

    struct Harness {
        registry: Arc<SessionRegistry>,
        speech: Arc<SpeechService>,
        synthesizer: Arc<FakeSynthesizer>,
        factory: FakeTransportFactory,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_synthesizer(FakeSynthesizer::default())
        }

        fn with_synthesizer(synthesizer: FakeSynthesizer) -> Self {
            let mixer = Arc::new(Mixer::new(pcm_encoder_factory()));
            let registry = SessionRegistry::new(mixer.clone(), 3);
            let synthesizer = Arc::new(synthesizer);
            let speech = Arc::new(SpeechService::new(
                mixer,
                synthesizer.clone(),
                Arc::new(JsonConfigStore::in_memory()),
                100,
            ));
            registry.subscribe(speech.clone());
            let (factory, _rx) = FakeTransportFactory::new();
            Self {
                registry,
                speech,
                synthesizer,
                factory,
            }
        }

        async fn connect(&self) {
            self.registry
                .connect(GUILD, VOICE, &self.factory)
                .await
                .unwrap();
        }

        /// Speaks `text` and waits for the clip to be queued.
        async fn speak(&self, member: UserId, text: &str) -> VoiceResult<TrackInfo> {
            self.speech.speak(GUILD, member, text).await?.outcome().await
        }
    }

    #[tokio::test]
    async fn speaks_with_the_member_voice() {
        let h = Harness::new();
        h.connect().await;

        h.speak(UserId(1), "hello").await.unwrap();
        assert_eq!(
            h.speech.set_voice(UserId(2), Some("EN_UK_001")).await.unwrap(),
            "en_uk_001"
        );
        h.speak(UserId(2), "cheerio").await.unwrap();

        assert_eq!(
            *h.synthesizer.requests.lock(),
            vec![
                ("hello".to_string(), "en_us_001".to_string()),
                ("cheerio".to_string(), "en_uk_001".to_string()),
            ]
        );
        let queue = h.speech.queue(GUILD).unwrap();
        assert_eq!(queue.state, PlaybackState::Playing);
        assert_eq!(queue.queue.len(), 1);
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn speak_returns_before_synthesis_finishes() {
        let gate = Arc::new(Notify::new());
        let h = Harness::with_synthesizer(FakeSynthesizer {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        h.connect().await;

        let pending = tokio::time::timeout(
            Duration::from_millis(200),
            h.speech.speak(GUILD, UserId(1), "slow words"),
        )
        .await
        .expect("speak waited for synthesis")
        .unwrap();
        assert!(!pending.is_finished());
        assert!(h.speech.queue(GUILD).unwrap().current.is_none());

        gate.notify_one();
        assert_eq!(pending.outcome().await.unwrap().title, "slow words");
        assert_eq!(h.speech.queue(GUILD).unwrap().current.unwrap().title, "slow words");
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn toggles_gate_speech() {
        let h = Harness::new();
        h.connect().await;

        assert!(!h.speech.set_member_enabled(UserId(1), None).await.unwrap());
        assert!(matches!(
            h.speech.speak(GUILD, UserId(1), "hi").await,
            Err(VoiceError::FeatureDisabled(_))
        ));

        assert!(!h.speech.set_enabled(GUILD, Some(false)).await.unwrap());
        assert!(matches!(
            h.speech.speak(GUILD, UserId(2), "hi").await,
            Err(VoiceError::FeatureDisabled("tts"))
        ));
        assert!(h.synthesizer.requests.lock().is_empty());
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_voice_is_rejected() {
        let h = Harness::new();
        let err = h.speech.set_voice(UserId(1), Some("robot")).await.unwrap_err();
        assert!(matches!(err, VoiceError::LoadFailure(_)));
        assert_eq!(h.speech.voice_of(UserId(1)).await.unwrap(), "en_us_001");

        h.speech.set_voice(UserId(1), Some("en_au_001")).await.unwrap();
        assert_eq!(h.speech.set_voice(UserId(1), None).await.unwrap(), "en_us_001");
        assert_eq!(h.speech.voice_of(UserId(1)).await.unwrap(), "en_us_001");
    }

    #[tokio::test]
    async fn only_linked_channels_are_spoken() {
        let h = Harness::new();
        assert!(
            h.speech
                .handle_message(GUILD, TEXT, UserId(1), "early")
                .await
                .unwrap()
                .is_none()
        );

        h.connect().await;
        assert!(
            h.speech
                .handle_message(GUILD, TEXT, UserId(1), "unlinked")
                .await
                .unwrap()
                .is_none()
        );

        h.speech.link(GUILD, TEXT, ChannelId(99)).await.unwrap();
        assert!(
            h.speech
                .handle_message(GUILD, TEXT, UserId(1), "other voice channel")
                .await
                .unwrap()
                .is_none()
        );

        h.speech.link(GUILD, TEXT, VOICE).await.unwrap();
        let spoken = h
            .speech
            .handle_message(GUILD, TEXT, UserId(1), "linked")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(spoken.outcome().await.unwrap().title, "linked");
        assert_eq!(h.speech.links(GUILD).await.unwrap().len(), 1);

        assert!(h.speech.unlink(GUILD, TEXT).await.unwrap());
        assert!(!h.speech.unlink(GUILD, TEXT).await.unwrap());
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn skip_and_stop() {
        let h = Harness::new();
        assert!(matches!(h.speech.stop(GUILD), Err(VoiceError::NotConnected(_))));

        h.connect().await;
        h.speak(UserId(1), "one").await.unwrap();
        h.speak(UserId(1), "two").await.unwrap();
        h.speak(UserId(1), "three").await.unwrap();

        assert_eq!(h.speech.skip(GUILD).unwrap().unwrap().title, "one");
        h.speech.stop(GUILD).unwrap();
        let queue = h.speech.queue(GUILD).unwrap();
        assert_eq!(queue.state, PlaybackState::Idle);
        assert!(queue.queue.is_empty());
        h.registry.shutdown().await;
    }
}
