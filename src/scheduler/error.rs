//! Error types for the scheduler module

use std::fmt;

use crate::device::DeviceError;
use crate::schedule::{ScheduleError, StoreError, ValidationError};

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Device not present in the registry
    UnknownDevice {
        device: String,
    },

    /// Forced stop on a device with nothing recording
    NotRecording {
        device: String,
    },

    /// Rejected schedule edit
    Schedule(ScheduleError),

    /// Device command failure
    Device(DeviceError),

    /// Persistence failure
    Store(StoreError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDevice { device } => write!(f, "Unknown device '{}'", device),
            Self::NotRecording { device } => {
                write!(f, "No entry is recording on '{}'", device)
            }
            Self::Schedule(e) => write!(f, "{}", e),
            Self::Device(e) => write!(f, "{}", e),
            Self::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Schedule(e) => Some(e),
            Self::Device(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ScheduleError> for SchedulerError {
    fn from(err: ScheduleError) -> Self {
        Self::Schedule(err)
    }
}

impl From<ValidationError> for SchedulerError {
    fn from(err: ValidationError) -> Self {
        Self::Schedule(err.into())
    }
}

impl From<DeviceError> for SchedulerError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl SchedulerError {
    /// Create an unknown device error
    pub fn unknown_device(device: impl Into<String>) -> Self {
        Self::UnknownDevice {
            device: device.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Device(e) => e.is_recoverable(),
            Self::Schedule(e) => e.is_recoverable(),
            Self::Store(StoreError::Io { .. }) => true,
            _ => false,
        }
    }
}
