use thiserror::Error;

/// Errors surfaced by sessions, transports and the frame codec.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("not connected")]
    NotConnected,

    #[error("timed out waiting for device response")]
    Timeout,

    #[error("corrupt response frame: {0}")]
    FrameCorrupt(String),

    #[error("device returned Modbus exception 0x{0:02X}")]
    ExceptionResponse(u8),

    #[error("unknown register field: {0}")]
    UnknownField(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::Transport(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for SensorError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SensorError::Timeout
    }
}
