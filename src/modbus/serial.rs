//! Direct RS-485 serial transport.

use std::io::Read;
use std::io::Write;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use serialport::SerialPort;

use super::transport::Transport;
use crate::config::settings::ParityConfig;
use crate::utils::error::SensorError;

/// Idle window that terminates response assembly: once the device has
/// started answering, a gap this long with no further byte means the frame
/// is complete.
const INTER_BYTE_IDLE: Duration = Duration::from_millis(50);

/// Modbus RTU over a byte-oriented duplex serial link.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    parity: ParityConfig,
    stop_bits: u8,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(port_name: &str, baud_rate: u32, parity: &ParityConfig, stop_bits: u8) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            parity: parity.clone(),
            stop_bits,
            port: None,
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<(), SensorError> {
        let parity = match self.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };
        let stop_bits = match self.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        };

        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(INTER_BYTE_IDLE)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(stop_bits)
            .parity(parity)
            .open()
            .map_err(|e| {
                SensorError::Transport(format!("failed to open {}: {}", self.port_name, e))
            })?;

        info!(
            "🔌 Serial link open on {} ({} baud)",
            self.port_name, self.baud_rate
        );
        self.port = Some(port);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SensorError> {
        if self.port.take().is_some() {
            info!("Serial link on {} closed", self.port_name);
        }
        Ok(())
    }

    async fn exchange(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, SensorError> {
        let port = self.port.as_mut().ok_or(SensorError::NotConnected)?;

        port.write_all(request)?;
        port.flush()?;
        debug!("→ {}", hex::encode(request));

        let deadline = Instant::now() + timeout;
        let mut response: Vec<u8> = Vec::with_capacity(64);
        let mut chunk = [0u8; 64];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if response.is_empty() {
                    return Err(SensorError::Timeout);
                }
                break;
            }

            // Before the first byte, wait up to the whole budget; after it,
            // only up to the inter-byte idle window.
            let window = if response.is_empty() {
                remaining
            } else {
                INTER_BYTE_IDLE.min(remaining)
            };
            port.set_timeout(window)
                .map_err(|e| SensorError::Transport(e.to_string()))?;

            match port.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => response.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if response.is_empty() {
                        return Err(SensorError::Timeout);
                    }
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!("← {}", hex::encode(&response));
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exchange_requires_connection() {
        let mut transport =
            SerialTransport::new("/dev/ttyUSB0", 4800, &ParityConfig::None, 1);
        let err = transport
            .exchange(&[0x01, 0x03], Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::NotConnected));
    }

    #[tokio::test]
    async fn connect_fails_on_missing_port() {
        let mut transport = SerialTransport::new(
            "/dev/agrisense-no-such-port",
            4800,
            &ParityConfig::None,
            1,
        );
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, SensorError::Transport(_)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn disconnect_is_safe_when_not_connected() {
        let mut transport =
            SerialTransport::new("/dev/ttyUSB0", 4800, &ParityConfig::None, 1);
        transport.disconnect().await.unwrap();
    }
}
