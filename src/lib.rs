//! Agricultural Sensor Communication Library
//!
//! This library reads soil probes (moisture, temperature, EC, pH, NPK) and
//! air environment sensors (humidity, temperature, CO2, light) speaking
//! Modbus RTU, either over a direct RS-485 serial link or through an MQTT
//! bridge that tunnels the same frames as pub/sub messages. Logical
//! register reads are merged into as few bus transactions as the device
//! allows, and raw register words are decoded into scaled engineering
//! values from a declarative register map.

pub mod config;
pub mod modbus;
pub mod registers;
pub mod sensors;
pub mod utils;

// Re-export commonly used types
pub use config::{MqttSettings, ParityConfig, SessionConfig, TransportKind};
pub use modbus::{FunctionCode, MqttBridgeTransport, SerialTransport, Transport};
pub use registers::{ContiguousRange, DataType, ReadPlanner, RegisterField, RegisterMap};
pub use sensors::{AirSensor, SensorReading, SensorSession, SessionState, SoilSensor};
pub use utils::error::SensorError;

pub const VERSION: &str = "0.1.0";
