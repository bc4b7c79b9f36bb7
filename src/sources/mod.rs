pub mod http;
pub mod local;
pub mod manager;
pub mod memory;
pub mod plugin;

pub use manager::SourceManager;
pub use memory::MemoryTrack;
pub use plugin::{BoxedSource, ResolvedTrack, SourcePlugin, TrackResolver};
