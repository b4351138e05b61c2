use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub id: String,
    pub listen_addrs: String,
    pub catalog_file: String,
    pub log_level: String,
    pub log_base: String,
    pub replication_factor: usize,
    pub sweep_interval_ms: u64,
    pub suspect_threshold_ms: u64,
    pub dead_threshold_ms: u64,
    /// How long a deleted chunk id keeps being handed out for reclaim.
    pub reclaim_retention_ms: u64,
    pub client_sweep_interval_ms: u64,
    pub client_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: "coordinator".to_string(),
            listen_addrs: "0.0.0.0:5000".to_string(),
            catalog_file: "./temp/coordinator/metadata.json".to_string(),
            log_level: "info".to_string(),
            log_base: "./temp/coordinator/logs".to_string(),
            replication_factor: 3,
            sweep_interval_ms: 10_000,
            suspect_threshold_ms: 30_000,
            dead_threshold_ms: 60_000,
            reclaim_retention_ms: 120_000,
            client_sweep_interval_ms: 30_000,
            client_timeout_ms: 60_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
        let config_file_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| format!("./coordinator/config/{}.yaml", env));
        Self::load_from(&config_file_path)
    }

    pub fn load_from(config_file_path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_file_path))
            .merge(Env::prefixed("COORDINATOR_"))
            .extract::<Config>()?
            .validate()
    }

    /// Intervals drive `tokio::time::interval`, which panics on zero.
    pub fn validate(self) -> Result<Self, figment::Error> {
        for (name, value) in [
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("client_sweep_interval_ms", self.client_sweep_interval_ms),
        ] {
            if value == 0 {
                return Err(figment::Error::from(format!("{name} must be greater than zero")));
            }
        }
        Ok(self)
    }
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
    pub fn suspect_threshold(&self) -> Duration {
        Duration::from_millis(self.suspect_threshold_ms)
    }
    pub fn dead_threshold(&self) -> Duration {
        Duration::from_millis(self.dead_threshold_ms)
    }
    pub fn reclaim_retention(&self) -> Duration {
        Duration::from_millis(self.reclaim_retention_ms)
    }
    pub fn client_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.client_sweep_interval_ms)
    }
    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| match Config::load() {
    Ok(config) => config,
    Err(e) => panic!("Invalid coordinator configuration: {e}"),
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sweep_intervals_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.yaml");
        std::fs::write(&path, "client_sweep_interval_ms: 0\n").unwrap();
        let error = Config::load_from(&path.display().to_string()).unwrap_err();
        assert!(error.to_string().contains("client_sweep_interval_ms"));

        std::fs::write(&path, "sweep_interval_ms: 250\n").unwrap();
        let config = Config::load_from(&path.display().to_string()).unwrap();
        assert_eq!(config.sweep_interval(), Duration::from_millis(250));
    }
}
