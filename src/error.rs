//! Crate-wide error type
//!
//! Each layer keeps its own error enum; [`Error`] wraps them at module
//! boundaries and [`categorize`] classifies whatever ends up inside an
//! `anyhow` chain at the CLI.
//!
//! ```rust,ignore
//! use recsched::error::{Error, RecschedErrorTrait};
//!
//! fn report(err: &Error) {
//!     eprintln!("[{}] {} (retry: {})", err.category(), err, err.is_recoverable());
//! }
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

// Per-layer errors
pub use crate::device::error::DeviceError;
pub use crate::schedule::error::{ScheduleError, StoreError, ValidationError};
pub use crate::scheduler::error::SchedulerError;

/// Shared classification interface
pub trait RecschedErrorTrait: std::error::Error {
    /// Whether retrying the operation may succeed
    fn is_recoverable(&self) -> bool;

    /// Coarse class used when reporting
    fn category(&self) -> ErrorCategory;
}

/// Coarse error class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Device link errors (connect, timeout, refused command)
    Network,
    /// Rejected schedule edits (conflict, invalid field)
    Validation,
    /// Storage and I/O errors
    Storage,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any error the library can surface, wrapping the per-layer enums
#[derive(Error, Debug)]
pub enum Error {
    /// Schedule editing errors
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Device link and protocol errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Schedule file errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Engine errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Anything else, with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn schedule_category(err: &ScheduleError) -> ErrorCategory {
    match err {
        ScheduleError::Store(_) => ErrorCategory::Storage,
        _ => ErrorCategory::Validation,
    }
}

fn device_category(err: &DeviceError) -> ErrorCategory {
    match err {
        DeviceError::Io { .. } => ErrorCategory::Storage,
        _ => ErrorCategory::Network,
    }
}

fn scheduler_category(err: &SchedulerError) -> ErrorCategory {
    match err {
        SchedulerError::Schedule(inner) => schedule_category(inner),
        SchedulerError::Device(inner) => device_category(inner),
        SchedulerError::Store(_) => ErrorCategory::Storage,
        SchedulerError::UnknownDevice { .. } | SchedulerError::NotRecording { .. } => {
            ErrorCategory::Validation
        }
    }
}

/// Category of the outermost recognized error in an `anyhow` chain
pub fn categorize(err: &anyhow::Error) -> ErrorCategory {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<Error>() {
            return e.category();
        }
        if let Some(e) = cause.downcast_ref::<SchedulerError>() {
            return scheduler_category(e);
        }
        if let Some(e) = cause.downcast_ref::<ScheduleError>() {
            return schedule_category(e);
        }
        if cause.is::<ValidationError>() {
            return ErrorCategory::Validation;
        }
        if let Some(e) = cause.downcast_ref::<DeviceError>() {
            return device_category(e);
        }
        if cause.is::<StoreError>() || cause.is::<io::Error>() || cause.is::<serde_json::Error>() {
            return ErrorCategory::Storage;
        }
    }
    ErrorCategory::Other
}

impl RecschedErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Schedule(e) => e.is_recoverable(),
            Self::Device(e) => e.is_recoverable(),
            Self::Store(e) => matches!(e, StoreError::Io { .. }),
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Schedule(e) => schedule_category(e),
            Self::Device(e) => device_category(e),
            Self::Store(_) | Self::Io(_) | Self::Json(_) => ErrorCategory::Storage,
            Self::Scheduler(e) => scheduler_category(e),
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Schedule(err.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result with the crate-wide [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let device_err = Error::Device(DeviceError::connection("Enc1", "refused"));
        assert_eq!(device_err.category(), ErrorCategory::Network);

        let conflict: Error = ScheduleError::conflict("Enc1", vec!["News".into()]).into();
        assert_eq!(conflict.category(), ErrorCategory::Validation);

        let unknown: Error = SchedulerError::unknown_device("Enc9").into();
        assert_eq!(unknown.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_is_recoverable() {
        let device_err = Error::Device(DeviceError::connection("Enc1", "timed out"));
        assert!(device_err.is_recoverable());

        let invalid: Error = ValidationError::EmptyLabel.into();
        assert!(!invalid.is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = ValidationError::DeleteRefused.into();
        assert!(matches!(
            unified,
            Error::Schedule(ScheduleError::Validation(ValidationError::DeleteRefused))
        ));
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("tick_ms must be greater than 0");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_categorize_anyhow_chain() {
        let err = anyhow::Error::new(SchedulerError::unknown_device("Enc9"))
            .context("Failed to start recording");
        assert_eq!(categorize(&err), ErrorCategory::Validation);

        let err = anyhow::Error::new(DeviceError::connection("Enc1", "refused"));
        assert_eq!(categorize(&err), ErrorCategory::Network);

        assert_eq!(categorize(&anyhow::anyhow!("plain")), ErrorCategory::Other);
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(ErrorCategory::Other.to_string(), "other");
    }
}
