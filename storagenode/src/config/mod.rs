use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    // path to the dir where chunks will be stored
    pub storage_path: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Names the log file; the coordinator assigns the real id.
    pub node_name: String,
    pub coordinator_addrs: String,
    pub listen_addrs: String,
    /// Host and port peers and clients use to reach this node.
    pub advertise_host: String,
    pub advertise_port: u16,
    pub storage_config: StorageConfig,
    pub replication_factor: usize,
    pub heartbeat_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub register_retries: u8,
    pub log_level: String,
    pub log_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: "storagenode".to_string(),
            coordinator_addrs: "http://127.0.0.1:5000".to_string(),
            listen_addrs: "0.0.0.0:6000".to_string(),
            advertise_host: "127.0.0.1".to_string(),
            advertise_port: 6000,
            storage_config: StorageConfig {
                storage_path: "./temp/storagenode/6000".to_string(),
            },
            replication_factor: 3,
            heartbeat_interval_ms: 3_000,
            request_timeout_ms: 5_000,
            register_retries: 5,
            log_level: "info".to_string(),
            log_base: "./temp/storagenode/logs".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
        let config_file_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| format!("./storagenode/config/{}.yaml", env));
        Self::load_from(&config_file_path)
    }

    pub fn load_from(config_file_path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_file_path))
            .merge(Env::prefixed("STORAGENODE_").split("__"))
            .extract::<Config>()?
            .validate()
    }

    /// The interval drives `tokio::time::interval`, which panics on zero.
    pub fn validate(self) -> Result<Self, figment::Error> {
        if self.heartbeat_interval_ms == 0 {
            return Err(figment::Error::from("heartbeat_interval_ms must be greater than zero".to_owned()));
        }
        Ok(self)
    }
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| match Config::load() {
    Ok(config) => config,
    Err(e) => panic!("Invalid storage node configuration: {e}"),
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_heartbeat_interval_is_rejected() {
        let config = Config {
            heartbeat_interval_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.yaml");
        std::fs::write(&path, "heartbeat_interval_ms: 0\n").unwrap();
        let error = Config::load_from(&path.display().to_string()).unwrap_err();
        assert!(error.to_string().contains("heartbeat_interval_ms"));
    }
}
