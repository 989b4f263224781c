//! Interval conflict detection
//!
//! Two entries on the same device conflict when their absolute half-open
//! `[start, end)` intervals intersect. Touching endpoints do not conflict.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::entry::{hours_to_secs, instant_at, EntryId, ScheduleEntry};

/// Half-open interval intersection test
pub fn intervals_intersect(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Absolute bounds of a candidate interval
pub fn candidate_bounds(
    date: NaiveDate,
    start_hour: f64,
    duration_hours: f64,
) -> (NaiveDateTime, NaiveDateTime) {
    let start = instant_at(date, start_hour);
    (start, start + Duration::seconds(hours_to_secs(duration_hours)))
}

/// Read-only view over a set of entries for conflict queries
pub struct OverlapIndex<'a> {
    entries: Vec<&'a ScheduleEntry>,
}

impl<'a> OverlapIndex<'a> {
    /// Build an index over the given entries
    pub fn new(entries: impl IntoIterator<Item = &'a ScheduleEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Entries on `device_id` (other than `exclude_id`) whose interval
    /// intersects the candidate
    pub fn conflicts(
        &self,
        device_id: &str,
        date: NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> impl Iterator<Item = &'a ScheduleEntry> + '_ {
        let (new_start, new_end) = candidate_bounds(date, start_hour, duration_hours);
        let device_id = device_id.to_owned();

        self.entries.iter().copied().filter(move |entry| {
            entry.device_id == device_id
                && Some(entry.id) != exclude_id
                && intervals_intersect(new_start, new_end, entry.start_at(), entry.end_at())
        })
    }

    /// True on the first conflicting entry
    pub fn is_overlap(
        &self,
        device_id: &str,
        date: NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> bool {
        self.conflicts(device_id, date, start_hour, duration_hours, exclude_id)
            .next()
            .is_some()
    }

    /// Labels of all conflicting entries, for user-facing messages
    pub fn conflicting_labels(
        &self,
        device_id: &str,
        date: NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> Vec<String> {
        self.conflicts(device_id, date, start_hour, duration_hours, exclude_id)
            .map(|entry| entry.label.clone())
            .collect()
    }
}
