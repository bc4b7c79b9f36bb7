use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    /// UDP endpoint receiving the RTP stream, `host:port`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Consecutive failed sends tolerated before the session is torn down.
    #[serde(default = "default_max_send_failures")]
    pub max_send_failures: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_send_failures: default_max_send_failures(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TtsConfig {
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,
    #[serde(default = "default_voice")]
    pub default_voice: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            default_voice: default_voice(),
            max_length: default_max_length(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StoreConfig {
    /// JSON file holding guild and member settings. Kept in memory only when unset.
    pub path: Option<String>,
}

fn default_endpoint() -> String {
    "127.0.0.1:5004".to_string()
}

fn default_max_send_failures() -> u32 {
    50
}

fn default_tts_base_url() -> String {
    "https://tiktok-tts.weilnet.workers.dev".to_string()
}

fn default_voice() -> String {
    "en_us_001".to_string()
}

fn default_max_length() -> usize {
    300
}

fn default_timeout_secs() -> u64 {
    15
}
