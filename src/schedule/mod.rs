//! Recording timetable
//!
//! This module holds the interval data model and everything that validates or
//! persists it.
//!
//! # Modules
//!
//! - [`entry`] - [`ScheduleEntry`], ids, statuses and hour arithmetic
//! - [`overlap`] - Per-device interval conflict detection
//! - [`book`] - Entry arena with the validated editing operations
//! - [`store`] - JSON persistence with legacy record support
//! - [`error`] - Schedule error types
//!
//! # Example
//!
//! ```ignore
//! use recsched::schedule::{NewEntry, ScheduleBook};
//!
//! let mut book = ScheduleBook::default();
//! let now = chrono::Local::now().naive_local();
//! let id = book.add_entry(
//!     NewEntry {
//!         device_id: "Encoder 1".into(),
//!         date: now.date().succ_opt().unwrap(),
//!         start_hour: 9.0,
//!         duration_hours: 2.0,
//!         label: "Morning news".into(),
//!     },
//!     now,
//! )?;
//! ```

pub mod book;
pub mod entry;
pub mod error;
pub mod overlap;
pub mod store;

pub use book::{EntryEdit, NewEntry, ScheduleBook, DEFAULT_UNDO_DEPTH};
pub use entry::{format_hour, hour_of, EntryId, EntryStatus, ScheduleEntry, MAX_DURATION_HOURS};
pub use error::{ScheduleError, ScheduleResult, StoreError, ValidationError};
pub use overlap::{intervals_intersect, OverlapIndex};
pub use store::ScheduleStore;
