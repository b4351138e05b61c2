use std::{num::NonZeroUsize, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub client_id: String,
    pub coordinator_addrs: String,
    pub chunk_size_lines: NonZeroUsize,
    /// Storage nodes tried per chunk before an upload gives up.
    pub write_attempts: u8,
    pub request_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub log_level: String,
    pub log_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: format!("client-{}", uuid::Uuid::new_v4().simple()),
            coordinator_addrs: "http://127.0.0.1:5000".to_string(),
            chunk_size_lines: NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN),
            write_attempts: 3,
            request_timeout_ms: 5_000,
            ping_interval_ms: 10_000,
            log_level: "info".to_string(),
            log_base: "./temp/client/logs".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
        // giving defaule path to root of binary
        let config_file_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| format!("./client/config/{}.yaml", env));
        Self::load_from(&config_file_path)
    }

    pub fn load_from(config_file_path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_file_path))
            .merge(Env::prefixed("CLIENT_"))
            .extract::<Config>()?
            .validate()
    }

    /// The interval drives `tokio::time::interval`, which panics on zero.
    pub fn validate(self) -> Result<Self, figment::Error> {
        if self.ping_interval_ms == 0 {
            return Err(figment::Error::from("ping_interval_ms must be greater than zero".to_owned()));
        }
        Ok(self)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| match Config::load() {
    Ok(config) => config,
    Err(e) => panic!("Invalid client configuration: {e}"),
});
