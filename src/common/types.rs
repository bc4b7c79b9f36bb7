use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A thread-safe, mutually exclusive shared component.
pub type Shared<T> = Arc<parking_lot::Mutex<T>>;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl std::ops::Deref for $name {
            type Target = u64;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// Identifies a voice session. One session exists per guild at most.
    GuildId
);
snowflake_id!(ChannelId);
snowflake_id!(UserId);
snowflake_id!(RoleId);

/// Names an audio producer inside a session, e.g. the music player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProducerId(pub &'static str);

impl ProducerId {
    pub const MUSIC: ProducerId = ProducerId("music");
    pub const SPEECH: ProducerId = ProducerId("speech");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}
