//! Error types for the schedule module

use thiserror::Error;

use super::entry::EntryId;

/// Result type for schedule operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Rejections raised at the editing boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Label is empty after trimming
    #[error("Label must not be empty")]
    EmptyLabel,

    /// Duration is zero, negative or not finite
    #[error("Duration must be positive, got {0}")]
    NonPositiveDuration(f64),

    /// Duration beyond the longest allowed window
    #[error("Duration must be at most {max} hours, got {0}", max = super::entry::MAX_DURATION_HOURS)]
    DurationTooLong(f64),

    /// Start hour outside [0, 24)
    #[error("Start hour must be in [0, 24), got {0}")]
    HourOutOfRange(f64),

    /// Candidate start lies before now
    #[error("Start time {0} is in the past")]
    StartInPast(String),

    /// Candidate end lies before now
    #[error("End time {0} is before now")]
    EndBeforeNow(String),

    /// Start time or device of an entry that already began cannot change
    #[error("Entry has already started; only label and duration can be edited")]
    StartedEntryLocked,

    /// Entry already ended and cannot be edited
    #[error("Entry has already finished")]
    EntryFinished,

    /// Delete refused because the entry already started or finished
    #[error("Entry has already started or finished and cannot be deleted")]
    DeleteRefused,

    /// Device name is empty
    #[error("Device must not be empty")]
    EmptyDevice,
}

/// Schedule-specific errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Candidate interval intersects existing entries on the same device
    #[error("Interval overlaps existing entries on '{device}': {}", labels.join(", "))]
    Conflict { device: String, labels: Vec<String> },

    /// Input rejected by validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No entry with this id
    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    /// Undo stack is empty
    #[error("Nothing to restore")]
    NothingToRestore,

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by the schedule store
#[derive(Error, Debug)]
pub enum StoreError {
    /// File system failure
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed record in the schedule file
    #[error("Invalid record #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

impl StoreError {
    /// Create an I/O error with the offending path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl ScheduleError {
    /// Create a conflict error
    pub fn conflict(device: impl Into<String>, labels: Vec<String>) -> Self {
        Self::Conflict {
            device: device.into(),
            labels,
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Io { .. }))
    }
}
