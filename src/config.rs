// Configuration for the MPD bridge
//
// The configuration is a JSON document; every section and field is optional
// and falls back to a default. Command line flags override single fields
// after the file has been read.

use crate::bridge::TopicScheme;
use crate::data::ChangePolicy;
use crate::error::{BridgeError, BridgeResult};
use crate::logging::LoggingConfig;
use crate::players::{Favourite, PoolSettings};
use serde::{Serialize, Deserialize};
use std::fs;
use std::path::Path;
use log::debug;

/// MPD connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpdSettings {
    #[serde(default = "default_mpd_host")]
    pub host: String,

    #[serde(default = "default_mpd_port")]
    pub port: u16,

    /// Shared secret sent with MPD's `password` command
    #[serde(default)]
    pub password: Option<String>,

    /// Socket timeout in milliseconds for everything but the idle wait; 0 disables it
    #[serde(default = "default_mpd_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_mpd_timeout_ms() -> u64 {
    10_000
}

fn default_mpd_host() -> String {
    "localhost".to_string()
}

fn default_mpd_port() -> u16 {
    6600
}

impl Default for MpdSettings {
    fn default() -> Self {
        Self {
            host: default_mpd_host(),
            port: default_mpd_port(),
            password: None,
            timeout_ms: default_mpd_timeout_ms(),
        }
    }
}

/// MQTT broker parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSettings {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "mpdbridge".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub mpd: MpdSettings,

    #[serde(default)]
    pub mqtt: MqttSettings,

    #[serde(default)]
    pub topics: TopicScheme,

    #[serde(default)]
    pub favourite: Favourite,

    #[serde(default)]
    pub pool: PoolSettings,

    /// How the snapshots decide that an attribute changed
    #[serde(default)]
    pub snapshot_change_policy: ChangePolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load the configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let path = path.as_ref();
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> BridgeResult<Self> {
        let config: BridgeConfig = serde_json::from_str(json)
            .map_err(|e| BridgeError::Config(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.mpd.host.is_empty() {
            return Err(BridgeError::Config("mpd.host must not be empty".to_string()));
        }
        if self.mqtt.host.is_empty() {
            return Err(BridgeError::Config("mqtt.host must not be empty".to_string()));
        }
        if self.pool.max_attempts == 0 {
            return Err(BridgeError::Config("pool.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// A sample configuration with every section filled in
    pub fn sample() -> Self {
        let mut config = BridgeConfig::default();
        config.favourite = Favourite::new("name", "Radio Paradise");
        config.logging = LoggingConfig::create_sample_config();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config.mpd.host, "localhost");
        assert_eq!(config.mpd.port, 6600);
        assert_eq!(config.mpd.timeout_ms, 10_000);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.topics.prefix, "MPD");
        assert_eq!(config.pool.max_attempts, 10);
        assert_eq!(config.pool.retry_delay_ms, 5000);
        assert_eq!(config.snapshot_change_policy, ChangePolicy::Strict);
        assert!(!config.favourite.is_configured());
    }

    #[test]
    fn test_partial_sections() {
        let config = BridgeConfig::from_json(r#"{
            "mpd": { "host": "music.local", "password": "secret" },
            "topics": { "prefix": "home/mpd/" },
            "favourite": { "text": "Radio Paradise" },
            "snapshot_change_policy": "truthy"
        }"#).unwrap();

        assert_eq!(config.mpd.host, "music.local");
        assert_eq!(config.mpd.port, 6600);
        assert_eq!(config.mpd.password.as_deref(), Some("secret"));
        assert_eq!(config.topics.player("state"), "home/mpd/player/state");
        assert_eq!(config.favourite.tag, "name");
        assert!(config.favourite.is_configured());
        assert_eq!(config.snapshot_change_policy, ChangePolicy::Truthy);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(BridgeConfig::from_json("{ not json"), Err(BridgeError::Config(_))));
        assert!(matches!(
            BridgeConfig::from_json(r#"{ "pool": { "max_attempts": 0 } }"#),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "mqtt": {{ "host": "broker", "port": 8883 }} }}"#).unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.mqtt.host, "broker");
        assert_eq!(config.mqtt.port, 8883);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            BridgeConfig::load("/nonexistent/mpdbridge.json"),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_sample_round_trips() {
        let sample = BridgeConfig::sample();
        let json = serde_json::to_string_pretty(&sample).unwrap();
        assert_eq!(BridgeConfig::from_json(&json).unwrap(), sample);
    }
}
