use std::time::Duration;

use async_trait::async_trait;

use crate::utils::error::SensorError;

/// A byte-oriented request/response channel carrying Modbus RTU frames.
///
/// Implementations move one frame at a time and must be driven
/// sequentially: a session never issues a second request on the same
/// channel before the previous one has completed or timed out.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<(), SensorError>;

    async fn disconnect(&mut self) -> Result<(), SensorError>;

    /// Sends a request frame and returns the raw response frame.
    ///
    /// Fails with [`SensorError::NotConnected`] if called before `connect`
    /// and with [`SensorError::Timeout`] when no response arrives within
    /// `timeout`.
    async fn exchange(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, SensorError>;

    fn is_connected(&self) -> bool;
}
