//! Session construction settings.
//!
//! One flat [`SessionConfig`] covers both transport variants; options
//! that do not apply to the selected variant are simply ignored, while
//! missing required options fail at construction time.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modbus::mqtt_bridge::MqttBridgeTransport;
use crate::modbus::serial::SerialTransport;
use crate::modbus::transport::Transport;
use crate::utils::error::SensorError;

/// Which channel carries the Modbus frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Serial,
    Mqtt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

/// Broker and topic settings consumed by the MQTT bridge transport.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub request_topic: String,
    pub response_topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub transport: TransportKind,
    pub unit_id: u8,
    pub timeout_ms: u64,

    // Serial link settings
    pub port: Option<String>,
    pub baudrate: u32,
    pub parity: ParityConfig,
    pub stop_bits: u8,

    // MQTT bridge settings
    pub mqtt_host: Option<String>,
    pub mqtt_port: u16,
    pub request_topic: Option<String>,
    pub response_topic: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub qos: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Serial,
            unit_id: 1,
            timeout_ms: 10_000,
            port: None,
            baudrate: 4800,
            parity: ParityConfig::None,
            stop_bits: 1,
            mqtt_host: None,
            mqtt_port: 1883,
            request_topic: None,
            response_topic: None,
            username: None,
            password: None,
            client_id: None,
            qos: 1,
        }
    }
}

impl SessionConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SensorError> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SensorError::ConfigError(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let config: SessionConfig = toml::from_str(&content)
            .map_err(|e| SensorError::ConfigError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SensorError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SensorError::ConfigError(format!("cannot create dir: {}", e)))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SensorError::ConfigError(format!("cannot serialize config: {}", e)))?;
        std::fs::write(&path, content).map_err(|e| {
            SensorError::ConfigError(format!("cannot write {}: {}", path.as_ref().display(), e))
        })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SensorError> {
        if !(1..=254).contains(&self.unit_id) {
            return Err(SensorError::ConfigError(format!(
                "unit id {} outside 1..=254",
                self.unit_id
            )));
        }
        if self.timeout_ms == 0 {
            return Err(SensorError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        match self.transport {
            TransportKind::Serial => {
                if self.port.is_none() {
                    return Err(SensorError::ConfigError(
                        "serial transport requires 'port'".to_string(),
                    ));
                }
            }
            TransportKind::Mqtt => {
                let request = self.request_topic.as_deref().ok_or_else(|| {
                    SensorError::ConfigError("mqtt transport requires 'request_topic'".to_string())
                })?;
                let response = self.response_topic.as_deref().ok_or_else(|| {
                    SensorError::ConfigError("mqtt transport requires 'response_topic'".to_string())
                })?;
                if request == response {
                    return Err(SensorError::ConfigError(
                        "request and response topics must differ".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Builds the transport variant selected by `transport`. Options that
    /// belong to the other variant are ignored.
    pub fn build_transport(&self) -> Result<Box<dyn Transport>, SensorError> {
        self.validate()?;
        match self.transport {
            TransportKind::Serial => {
                let port = self.port.as_deref().ok_or_else(|| {
                    SensorError::ConfigError("serial transport requires 'port'".to_string())
                })?;
                Ok(Box::new(SerialTransport::new(
                    port,
                    self.baudrate,
                    &self.parity,
                    self.stop_bits,
                )))
            }
            TransportKind::Mqtt => Ok(Box::new(MqttBridgeTransport::new(self.mqtt_settings()?))),
        }
    }

    fn mqtt_settings(&self) -> Result<MqttSettings, SensorError> {
        Ok(MqttSettings {
            host: self
                .mqtt_host
                .clone()
                .unwrap_or_else(|| "localhost".to_string()),
            port: self.mqtt_port,
            client_id: self
                .client_id
                .clone()
                .unwrap_or_else(|| format!("agrisense-{}", Uuid::new_v4())),
            request_topic: self.request_topic.clone().ok_or_else(|| {
                SensorError::ConfigError("mqtt transport requires 'request_topic'".to_string())
            })?,
            response_topic: self.response_topic.clone().ok_or_else(|| {
                SensorError::ConfigError("mqtt transport requires 'response_topic'".to_string())
            })?,
            username: self.username.clone(),
            password: self.password.clone(),
            qos: self.qos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_serial_config_needs_a_port() {
        let config = SessionConfig::default();
        assert!(matches!(
            config.validate(),
            Err(SensorError::ConfigError(_))
        ));

        let config = SessionConfig {
            port: Some("/dev/ttyUSB0".to_string()),
            ..SessionConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn mqtt_config_needs_both_topics() {
        let mut config = SessionConfig {
            transport: TransportKind::Mqtt,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorError::ConfigError(_))
        ));

        config.request_topic = Some("sensors/request".to_string());
        assert!(matches!(
            config.validate(),
            Err(SensorError::ConfigError(_))
        ));

        config.response_topic = Some("sensors/response".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn mqtt_topics_must_differ() {
        let config = SessionConfig {
            transport: TransportKind::Mqtt,
            request_topic: Some("sensors/bus".to_string()),
            response_topic: Some("sensors/bus".to_string()),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorError::ConfigError(_))
        ));
    }

    #[test]
    fn unit_id_bounds_are_enforced() {
        let config = SessionConfig {
            unit_id: 0,
            port: Some("/dev/ttyUSB0".to_string()),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorError::ConfigError(_))
        ));

        let config = SessionConfig {
            unit_id: 255,
            port: Some("/dev/ttyUSB0".to_string()),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorError::ConfigError(_))
        ));
    }

    #[test]
    fn serial_options_are_ignored_for_mqtt() {
        // Leftover serial keys must not prevent an MQTT session.
        let config = SessionConfig {
            transport: TransportKind::Mqtt,
            port: Some("/dev/ttyUSB0".to_string()),
            request_topic: Some("sensors/request".to_string()),
            response_topic: Some("sensors/response".to_string()),
            ..SessionConfig::default()
        };
        config.validate().unwrap();
        assert!(config.build_transport().is_ok());
    }

    #[test]
    fn generated_client_id_is_prefixed() {
        let config = SessionConfig {
            transport: TransportKind::Mqtt,
            request_topic: Some("sensors/request".to_string()),
            response_topic: Some("sensors/response".to_string()),
            ..SessionConfig::default()
        };
        let settings = config.mqtt_settings().unwrap();
        assert!(settings.client_id.starts_with("agrisense-"));
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 1883);
        assert_eq!(settings.qos, 1);
    }

    #[test]
    fn parses_partial_toml() {
        let config: SessionConfig = toml::from_str(
            r#"
            transport = "serial"
            port = "/dev/ttyS0"
            unit_id = 3
            baudrate = 9600
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.unit_id, 3);
        assert_eq!(config.baudrate, 9600);
        // Unspecified keys keep their defaults.
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.mqtt_port, 1883);
    }

    #[test]
    fn build_serial_transport_without_opening_port() {
        let config = SessionConfig {
            port: Some("/dev/ttyUSB0".to_string()),
            ..SessionConfig::default()
        };
        let transport = config.build_transport().unwrap();
        assert!(!transport.is_connected());
    }
}
