use std::time::Duration;

use reqwest::{Client, Error};

const DEFAULT_USER_AGENT: &str = concat!("voxline/", env!("CARGO_PKG_VERSION"));

pub struct HttpClient;

impl HttpClient {
    pub fn default_user_agent() -> String {
        DEFAULT_USER_AGENT.to_string()
    }

    pub fn new() -> Result<Client, Error> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Client, Error> {
        Client::builder()
            .user_agent(Self::default_user_agent())
            .timeout(timeout)
            .build()
    }
}
