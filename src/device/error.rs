//! Error types for the device layer

use thiserror::Error;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised while talking to an encoder
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Socket could not be opened or broke mid-command
    #[error("Connection to {device} failed: {reason}")]
    Connection { device: String, reason: String },

    /// Device answered without the success token
    #[error("{command} on {device} was rejected: {response}")]
    Protocol {
        device: String,
        command: String,
        response: String,
    },

    /// Device name not present in the registry
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Encoding label not recognised
    #[error("Unsupported encoding label: {0}")]
    Encoding(String),

    /// Device configuration file failure
    #[error("Device config I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Device configuration file is not valid JSON
    #[error("Device config format error: {0}")]
    Format(#[from] serde_json::Error),
}

impl DeviceError {
    /// Create a connection error
    pub fn connection(device: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a protocol rejection error
    pub fn protocol(
        device: impl Into<String>,
        command: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self::Protocol {
            device: device.into(),
            command: command.into(),
            response: response.into(),
        }
    }

    /// Create a config file I/O error
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Io { .. })
    }
}
