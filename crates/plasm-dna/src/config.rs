//! Instance configuration: the non-DNA settings for one running chain.

use serde::{Deserialize, Serialize};

/// Default listen port for a node.
pub const DEFAULT_PORT: u16 = 6283;

/// One logging sink: a format pattern and an on/off switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggerConfig {
    pub format: String,
    pub enabled: bool,
}

impl LoggerConfig {
    fn new(format: &str, enabled: bool) -> Self {
        Self {
            format: format.to_string(),
            enabled,
        }
    }
}

/// The logging sinks for the different parts of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct Loggers {
    pub app: LoggerConfig,
    #[serde(rename = "DHT")]
    pub dht: LoggerConfig,
    pub gossip: LoggerConfig,
    pub test_passed: LoggerConfig,
    pub test_failed: LoggerConfig,
    pub test_info: LoggerConfig,
}

/// The per-instance configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Config {
    pub port: u16,
    pub peer_mode_author: bool,
    #[serde(rename = "PeerModeDHTNode")]
    pub peer_mode_dht_node: bool,
    pub bootstrap_server: String,
    pub loggers: Loggers,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            peer_mode_author: true,
            peer_mode_dht_node: false,
            bootstrap_server: String::new(),
            loggers: Loggers {
                app: LoggerConfig::new("%{message}", true),
                dht: LoggerConfig::new("%{time} DHT: %{message}", false),
                gossip: LoggerConfig::new("%{time} Gossip: %{message}", false),
                test_passed: LoggerConfig::new("%{message}", true),
                test_failed: LoggerConfig::new("%{message}", true),
                test_info: LoggerConfig::new("%{message}", true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.peer_mode_author);
        assert!(!config.peer_mode_dht_node);
        assert!(config.loggers.app.enabled);
        assert!(!config.loggers.dht.enabled);
    }

    #[test]
    fn test_document_field_names() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("Port").is_some());
        assert!(json.get("PeerModeDHTNode").is_some());
        assert!(json.get("Loggers").unwrap().get("DHT").is_some());
        assert!(json.get("Loggers").unwrap().get("TestPassed").is_some());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"Port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.peer_mode_author);
    }
}
