use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        if config_str.trim().is_empty() {
            return Err(format!("{} is empty", config_path).into());
        }

        Self::parse(&config_str)
    }

    pub fn parse(raw: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(raw)?;
        if config.player.default_volume > 100 {
            return Err(format!(
                "player.default_volume must be between 0 and 100, got {}",
                config.player.default_volume
            )
            .into());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse("[server]\npassword = \"secret\"\n").unwrap();
        assert_eq!(config.server.port, 6139);
        assert_eq!(config.server.password, "secret");
        assert_eq!(config.player.default_volume, 100);
        assert_eq!(config.tts.default_voice, "en_us_001");
        assert!(config.store.path.is_none());
        assert!(config.logging.is_none());
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let raw = "[server]\npassword = \"x\"\n[player]\ndefault_volume = 150\n";
        assert!(Config::parse(raw).is_err());
    }

    #[test]
    fn reads_nested_sections() {
        let raw = r#"
[server]
host = "127.0.0.1"
port = 7000
password = "pw"

[logging]
level = "debug"

[logging.file]
path = "logs/voxline.log"

[transport]
endpoint = "10.0.0.2:6000"

[tts]
max_length = 120
"#;
        let config = Config::parse(raw).unwrap();
        assert_eq!(config.server.port, 7000);
        let file = config.logging.unwrap().file.unwrap();
        assert_eq!(file.max_lines, 10_000);
        assert_eq!(config.transport.endpoint, "10.0.0.2:6000");
        assert_eq!(config.tts.max_length, 120);
    }
}
