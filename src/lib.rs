pub mod audio;
pub mod common;
pub mod configs;
pub mod features;
pub mod gateway;
pub mod player;
pub mod server;
pub mod sources;
pub mod store;
pub mod transport;
pub mod tts;
