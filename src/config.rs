//! Top-level configuration for the `newsqueued` runner binary.

use crate::connector::ServerInfo;
use crate::error::{QueueError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub fn from_str(txt: &str) -> Result<AppConfig> {
    let txt = txt.trim_start();
    let parsed = if txt.starts_with('{') {
        serde_json::from_str(txt).map_err(|e| QueueError::Config(e.to_string()))
    } else {
        serde_yaml::from_str(txt).map_err(|e| QueueError::Config(e.to_string()))
    };
    parsed
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AppConfig {
    pub servers: Vec<ServerInfo>,
    #[serde(default = "default_upkeep_interval_ms")]
    pub upkeep_interval_ms: u64,
    #[serde(default = "default_save_interval_ms")]
    pub save_interval_ms: u64,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default)]
    pub tls_trust_roots: Vec<String>,
}

fn default_upkeep_interval_ms() -> u64 {
    1_000
}

fn default_save_interval_ms() -> u64 {
    10_000
}

fn default_idle_timeout_ms() -> u64 {
    5 * 60 * 1_000
}

impl AppConfig {
    pub fn upkeep_interval(&self) -> Duration {
        Duration::from_millis(self.upkeep_interval_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_yaml() {
        let yaml = "
servers:
  - id: eweka
    host: news.eweka.nl
    port: 119
        ";
        let cfg = from_str(yaml).unwrap();
        assert_eq!(cfg.servers.len(), 1);
        assert_eq!(cfg.servers[0].id, "eweka");
        assert_eq!(cfg.upkeep_interval_ms, default_upkeep_interval_ms());
    }

    #[test]
    fn parse_simple_json() {
        let json = r#"{"servers": [{"id": "eweka", "host": "news.eweka.nl", "port": 119}]}"#;
        let cfg = from_str(json).unwrap();
        assert_eq!(cfg.servers.len(), 1);
        assert_eq!(cfg.servers[0].port, 119);
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "
servers: []
bogusField: true
        ";
        assert!(from_str(yaml).is_err());
    }
}
