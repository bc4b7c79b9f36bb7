use std::{future::Future, sync::Arc};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    audio::{
        mix::{FrameSource, MixError, Mixer},
        stream::PcmFrame,
    },
    common::{
        errors::{VoiceError, VoiceResult},
        types::{GuildId, ProducerId, Shared, UserId},
    },
    player::{
        entry::{QueueEntry, TrackInfo},
        scheduler::{SchedulerSnapshot, TrackScheduler},
    },
    sources::{ResolvedTrack, TrackResolver},
};

/// Adapts a scheduler to the mixer. Skips the tick instead of waiting when a
/// command holds the scheduler lock.
struct SchedulerSource {
    scheduler: Shared<TrackScheduler>,
}

impl FrameSource for SchedulerSource {
    fn pull(&self) -> Result<Option<PcmFrame>, MixError> {
        Ok(self
            .scheduler
            .try_lock()
            .and_then(|mut scheduler| scheduler.pull_frame()))
    }
}

/// Handle to a background load started by [`ProducerBinding::load`].
#[derive(Debug)]
pub struct PendingLoad {
    handle: JoinHandle<VoiceResult<TrackInfo>>,
}

impl PendingLoad {
    /// Waits for the load. Dropping the `PendingLoad` instead lets it finish
    /// in the background.
    pub async fn outcome(self) -> VoiceResult<TrackInfo> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(VoiceError::load_failure(e)),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Ties one scheduler to one producer slot of a session's mix.
pub struct ProducerBinding {
    guild_id: GuildId,
    producer_id: ProducerId,
    scheduler: Shared<TrackScheduler>,
    mixer: Arc<Mixer>,
    resolver: Arc<dyn TrackResolver>,
    cancel: CancellationToken,
}

impl ProducerBinding {
    /// Registers `scheduler` with the mixer as `producer_id` of `guild_id`.
    pub fn attach(
        guild_id: GuildId,
        producer_id: ProducerId,
        scheduler: TrackScheduler,
        mixer: Arc<Mixer>,
        resolver: Arc<dyn TrackResolver>,
    ) -> Arc<Self> {
        let scheduler = Arc::new(Mutex::new(scheduler));
        mixer.register_producer(
            &guild_id,
            producer_id,
            Arc::new(SchedulerSource {
                scheduler: scheduler.clone(),
            }),
        );
        Arc::new(Self {
            guild_id,
            producer_id,
            scheduler,
            mixer,
            resolver,
            cancel: CancellationToken::new(),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn producer_id(&self) -> ProducerId {
        self.producer_id
    }

    /// Resolves `query` in the background and enqueues the result.
    pub fn load(&self, query: impl Into<String>, requester: UserId) -> PendingLoad {
        let resolver = self.resolver.clone();
        let query = query.into();
        self.load_with(requester, async move { resolver.resolve(&query).await })
    }

    /// Like [`load`](Self::load) with a caller-supplied resolution future.
    pub fn load_with<F>(&self, requester: UserId, resolve: F) -> PendingLoad
    where
        F: Future<Output = VoiceResult<ResolvedTrack>> + Send + 'static,
    {
        let cancel = self.cancel.child_token();
        let scheduler = self.scheduler.clone();
        let label = format!("{}/{}", self.guild_id, self.producer_id);

        let handle = tokio::spawn(async move {
            let resolved = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                resolved = resolve => resolved,
            };
            match resolved {
                Ok(track) => enqueue_unless_cancelled(&scheduler, &cancel, track, requester),
                Err(e) => {
                    warn!("[{}] load failed: {}", label, e);
                    Err(e)
                }
            }
        });

        PendingLoad { handle }
    }

    /// Runs `f` against the scheduler under its lock.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&mut TrackScheduler) -> R) -> R {
        f(&mut self.scheduler.lock())
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.scheduler.lock().snapshot()
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels pending loads, leaves the mix and stops playback.
    pub fn teardown(&self) {
        self.cancel.cancel();
        self.mixer
            .deregister_producer(&self.guild_id, &self.producer_id);
        self.scheduler.lock().clear();
        debug!("[{}/{}] binding torn down", self.guild_id, self.producer_id);
    }
}

fn cancelled() -> VoiceError {
    VoiceError::LoadFailure("load cancelled".to_string())
}

fn enqueue_unless_cancelled(
    scheduler: &Mutex<TrackScheduler>,
    cancel: &CancellationToken,
    track: ResolvedTrack,
    requester: UserId,
) -> VoiceResult<TrackInfo> {
    let mut scheduler = scheduler.lock();
    // Teardown clears under this same lock, so a load finishing concurrently
    // either lands before the clear or not at all.
    if cancel.is_cancelled() {
        return Err(cancelled());
    }
    let info = track.info.clone();
    scheduler.enqueue(QueueEntry::new(track.info, requester, track.playable));
    Ok(info)
}
