//! Recording interval data model
//!
//! A [`ScheduleEntry`] is one recording window for one device. Its position in
//! time is expressed the way operators enter it (a calendar date plus a
//! fractional start hour and a duration in hours); absolute instants are
//! derived at one-second resolution, rolling over into following days when
//! `start_hour + duration_hours` reaches 24.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::ValidationError;

// ============================================================================
// Entry Id
// ============================================================================

/// Opaque, immutable identifier of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

// ============================================================================
// Entry Status
// ============================================================================

/// Lifecycle status of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Start instant not reached yet
    #[default]
    Waiting,
    /// Start command applied, end not reached
    Recording,
    /// Stopped early by an explicit stop
    Stopped,
    /// End instant reached and stop applied
    Ended,
    /// Last device command for this entry failed
    Error,
}

impl EntryStatus {
    /// Whether no further transitions are expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Ended)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Recording => "recording",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ============================================================================
// Hour helpers
// ============================================================================

/// Convert fractional hours to whole seconds
pub fn hours_to_secs(hours: f64) -> i64 {
    (hours * 3600.0).round() as i64
}

/// Longest window an entry may span
pub const MAX_DURATION_HOURS: f64 = 24.0 * 7.0;

/// Check a start hour and duration before they reach any date arithmetic
pub fn validate_hours(start_hour: f64, duration_hours: f64) -> Result<(), ValidationError> {
    if !(0.0..24.0).contains(&start_hour) || !start_hour.is_finite() {
        return Err(ValidationError::HourOutOfRange(start_hour));
    }
    if !duration_hours.is_finite() || duration_hours <= 0.0 {
        return Err(ValidationError::NonPositiveDuration(duration_hours));
    }
    if duration_hours > MAX_DURATION_HOURS {
        return Err(ValidationError::DurationTooLong(duration_hours));
    }
    Ok(())
}

/// `base` moved by `secs` seconds, saturating at the calendar limits
fn offset_secs(base: NaiveDateTime, secs: i64) -> NaiveDateTime {
    let limit = if secs < 0 {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    };
    Duration::try_seconds(secs)
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(limit)
}

/// Absolute instant of `hour` hours after midnight of `date`
pub fn instant_at(date: NaiveDate, hour: f64) -> NaiveDateTime {
    offset_secs(date.and_time(NaiveTime::MIN), hours_to_secs(hour))
}

/// Fractional hour of a wall-clock time
pub fn hour_of(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 / 3600.0
}

/// Format a fractional hour as `HH:MM`
pub fn format_hour(hour: f64) -> String {
    let total_minutes = (hour * 60.0).round() as i64;
    let total_minutes = total_minutes.rem_euclid(24 * 60);
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

// ============================================================================
// Schedule Entry
// ============================================================================

/// One scheduled recording window for one device
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    /// Immutable unique id
    pub id: EntryId,

    /// Device (encoder) name
    pub device_id: String,

    /// Calendar date of the start
    pub date: NaiveDate,

    /// Start hour, 0 <= x < 24
    pub start_hour: f64,

    /// Duration in hours, > 0
    pub duration_hours: f64,

    /// Program label, also used for the recording file name
    pub label: String,

    /// Lifecycle status
    pub status: EntryStatus,

    /// Advisory text of the last device status seen; not persisted
    pub last_seen_device_status: Option<String>,
}

impl ScheduleEntry {
    /// Create a waiting entry with a fresh id
    pub fn new(
        device_id: impl Into<String>,
        date: NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        label: impl Into<String>,
    ) -> Self {
        Self::with_id(EntryId::new(), device_id, date, start_hour, duration_hours, label)
    }

    /// Create a waiting entry with a given id
    pub fn with_id(
        id: EntryId,
        device_id: impl Into<String>,
        date: NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            device_id: device_id.into(),
            date,
            start_hour,
            duration_hours,
            label: label.into(),
            status: EntryStatus::Waiting,
            last_seen_device_status: None,
        }
    }

    /// Absolute start instant
    pub fn start_at(&self) -> NaiveDateTime {
        instant_at(self.date, self.start_hour)
    }

    /// Absolute end instant (exclusive)
    pub fn end_at(&self) -> NaiveDateTime {
        offset_secs(self.start_at(), hours_to_secs(self.duration_hours))
    }

    /// End hour within the end date
    pub fn end_hour(&self) -> f64 {
        (self.start_hour + self.duration_hours) % 24.0
    }

    /// Calendar date holding the end instant
    pub fn end_date(&self) -> NaiveDate {
        self.end_at().date()
    }

    /// Whether the start instant has been reached
    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        self.start_at() <= now
    }

    /// Whether the end instant has been reached
    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        self.end_at() <= now
    }

    /// Status implied by the clock alone
    pub fn clock_status(&self, now: NaiveDateTime) -> EntryStatus {
        if now < self.start_at() {
            EntryStatus::Waiting
        } else if now < self.end_at() {
            EntryStatus::Recording
        } else {
            EntryStatus::Ended
        }
    }

    /// Whether the label participates in uniqueness checks
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// `HH:MM - HH:MM` with a `(+N)` day suffix when the end rolls over
    pub fn window_text(&self) -> String {
        let days = (self.end_date() - self.date).num_days();
        let end = format_hour(self.end_hour());
        if days > 0 {
            format!("{} - {} (+{})", format_hour(self.start_hour), end, days)
        } else {
            format!("{} - {}", format_hour(self.start_hour), end)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
