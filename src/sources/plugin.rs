use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::errors::VoiceResult,
    player::entry::{Playable, TrackInfo},
};

/// A query resolved into something the scheduler can play.
#[derive(Clone)]
pub struct ResolvedTrack {
    pub info: TrackInfo,
    pub playable: Arc<dyn Playable>,
}

impl std::fmt::Debug for ResolvedTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedTrack")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Turns a user query into a playable track.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> VoiceResult<ResolvedTrack>;
}

/// One backend of the [`SourceManager`](super::SourceManager).
#[async_trait]
pub trait SourcePlugin: Send + Sync {
    /// Identifier reported as the track's `source_name`, e.g. `"http"`.
    fn name(&self) -> &str;

    fn can_handle(&self, identifier: &str) -> bool;

    async fn load(&self, identifier: &str) -> VoiceResult<ResolvedTrack>;
}

pub type BoxedSource = Box<dyn SourcePlugin>;
