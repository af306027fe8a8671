pub mod crc;
pub mod frame;
pub mod mqtt_bridge;
pub mod serial;
pub mod transport;

pub use crc::crc16_modbus;
pub use frame::FunctionCode;
pub use mqtt_bridge::MqttBridgeTransport;
pub use serial::SerialTransport;
pub use transport::Transport;
