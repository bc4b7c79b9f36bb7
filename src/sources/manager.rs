use async_trait::async_trait;
use tracing::{debug, error, info};

use super::{
    http::HttpSource,
    local::LocalSource,
    plugin::{BoxedSource, ResolvedTrack, TrackResolver},
};
use crate::{
    common::errors::{VoiceError, VoiceResult},
    configs::PlayerConfig,
};

/// Dispatches queries to the first source that claims them.
pub struct SourceManager {
    sources: Vec<BoxedSource>,
}

impl SourceManager {
    pub fn new(config: &PlayerConfig, http: reqwest::Client) -> Self {
        let mut sources: Vec<BoxedSource> = Vec::new();

        macro_rules! register_source {
            ($enabled:expr, $name:literal, $ctor:expr) => {
                if $enabled {
                    match $ctor {
                        Ok(src) => {
                            info!("Loaded source: {}", $name);
                            sources.push(Box::new(src));
                        }
                        Err(e) => error!("{} source failed to initialize: {}", $name, e),
                    }
                }
            };
        }

        register_source!(config.http_source, "http", HttpSource::new(http, config));
        register_source!(
            config.local_source,
            "local",
            Ok::<_, std::convert::Infallible>(LocalSource::new(config))
        );

        Self { sources }
    }

    pub fn with_sources(sources: Vec<BoxedSource>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }
}

#[async_trait]
impl TrackResolver for SourceManager {
    async fn resolve(&self, query: &str) -> VoiceResult<ResolvedTrack> {
        let identifier = query
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');
        if identifier.is_empty() {
            return Err(VoiceError::LoadFailure("empty query".to_string()));
        }

        let source = self
            .sources
            .iter()
            .find(|s| s.can_handle(identifier))
            .ok_or_else(|| {
                VoiceError::LoadFailure(format!("no source can handle '{}'", identifier))
            })?;

        debug!("Loading '{}' with source {}", identifier, source.name());
        source.load(identifier).await
    }
}
