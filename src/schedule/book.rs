//! Entry arena and editing boundary
//!
//! [`ScheduleBook`] owns every [`ScheduleEntry`] keyed by [`EntryId`]. All
//! additions and edits are validated here before they are committed, so a
//! rejected change is never partially applied. Callers outside the book hold
//! ids, never references.

use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, HashSet, VecDeque};

use super::entry::{hour_of, validate_hours, EntryId, EntryStatus, ScheduleEntry};
use super::error::{ScheduleError, ScheduleResult, ValidationError};
use super::overlap::{candidate_bounds, OverlapIndex};

/// Default number of deletions kept for restoration
pub const DEFAULT_UNDO_DEPTH: usize = 20;

/// Fields of a new entry as entered by an operator
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub device_id: String,
    pub date: chrono::NaiveDate,
    pub start_hour: f64,
    pub duration_hours: f64,
    pub label: String,
}

/// Partial update of an existing entry
#[derive(Debug, Clone, Default)]
pub struct EntryEdit {
    pub device_id: Option<String>,
    pub date: Option<chrono::NaiveDate>,
    pub start_hour: Option<f64>,
    pub duration_hours: Option<f64>,
    pub label: Option<String>,
}

impl EntryEdit {
    pub fn is_empty(&self) -> bool {
        self.device_id.is_none()
            && self.date.is_none()
            && self.start_hour.is_none()
            && self.duration_hours.is_none()
            && self.label.is_none()
    }
}

fn validate_label(label: &str) -> Result<String, ValidationError> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    Ok(trimmed.to_string())
}

/// Arena of schedule entries with a bounded undo stack for deletions
#[derive(Debug)]
pub struct ScheduleBook {
    entries: HashMap<EntryId, ScheduleEntry>,
    undo: VecDeque<ScheduleEntry>,
    undo_depth: usize,
}

impl Default for ScheduleBook {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl ScheduleBook {
    /// Create an empty book
    pub fn new(undo_depth: usize) -> Self {
        Self {
            entries: HashMap::new(),
            undo: VecDeque::new(),
            undo_depth,
        }
    }

    /// Create a book from loaded entries without re-validation
    pub fn from_entries(entries: Vec<ScheduleEntry>, undo_depth: usize) -> Self {
        let mut book = Self::new(undo_depth);
        for entry in entries {
            if book.entries.contains_key(&entry.id) {
                tracing::warn!(entry_id = %entry.id, "Duplicate entry id in schedule, keeping first");
                continue;
            }
            book.entries.insert(entry.id, entry);
        }
        book
    }

    /// Swap in a reloaded entry set, keeping the undo stack
    pub fn replace_entries(&mut self, entries: Vec<ScheduleEntry>) {
        let reloaded = Self::from_entries(entries, self.undo_depth);
        self.entries = reloaded.entries;
    }

    /// Ids of all entries, unordered
    pub fn ids(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&ScheduleEntry> {
        self.entries.get(&id)
    }

    /// All entries ordered by start instant, then label
    pub fn entries(&self) -> Vec<&ScheduleEntry> {
        let mut list: Vec<_> = self.entries.values().collect();
        list.sort_by(|a, b| {
            a.start_at()
                .cmp(&b.start_at())
                .then_with(|| a.label.cmp(&b.label))
        });
        list
    }

    /// Owned copies of all entries, ordered as [`Self::entries`]
    pub fn to_vec(&self) -> Vec<ScheduleEntry> {
        self.entries().into_iter().cloned().collect()
    }

    /// Entries scheduled on one device
    pub fn entries_for_device(&self, device_id: &str) -> Vec<&ScheduleEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.device_id == device_id)
            .collect()
    }

    /// Conflict view over the current entries
    pub fn overlap_index(&self) -> OverlapIndex<'_> {
        OverlapIndex::new(self.entries.values())
    }

    pub fn is_overlap(
        &self,
        device_id: &str,
        date: chrono::NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> bool {
        self.overlap_index()
            .is_overlap(device_id, date, start_hour, duration_hours, exclude_id)
    }

    pub fn conflicting_labels(
        &self,
        device_id: &str,
        date: chrono::NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> Vec<String> {
        self.overlap_index()
            .conflicting_labels(device_id, date, start_hour, duration_hours, exclude_id)
    }

    /// Make `base` unique among active entries by appending `_1`, `_2`, ...
    pub fn unique_label(&self, base: &str, exclude_id: Option<EntryId>) -> String {
        let taken: HashSet<&str> = self
            .entries
            .values()
            .filter(|e| e.is_active() && Some(e.id) != exclude_id)
            .map(|e| e.label.as_str())
            .collect();

        if !taken.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}_{i}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    fn ensure_free(
        &self,
        device_id: &str,
        date: chrono::NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> ScheduleResult<()> {
        let labels =
            self.conflicting_labels(device_id, date, start_hour, duration_hours, exclude_id);
        if labels.is_empty() {
            Ok(())
        } else {
            Err(ScheduleError::conflict(device_id, labels))
        }
    }

    /// Validate and insert a new entry, returning its id
    pub fn add_entry(&mut self, new: NewEntry, now: NaiveDateTime) -> ScheduleResult<EntryId> {
        let device_id = new.device_id.trim().to_string();
        if device_id.is_empty() {
            return Err(ValidationError::EmptyDevice.into());
        }
        let label = validate_label(&new.label)?;
        validate_hours(new.start_hour, new.duration_hours)?;

        let (start, end) = candidate_bounds(new.date, new.start_hour, new.duration_hours);
        if start < now {
            return Err(ValidationError::StartInPast(start.to_string()).into());
        }
        if end < now {
            return Err(ValidationError::EndBeforeNow(end.to_string()).into());
        }

        self.ensure_free(&device_id, new.date, new.start_hour, new.duration_hours, None)?;

        let label = self.unique_label(&label, None);
        let entry = ScheduleEntry::new(device_id, new.date, new.start_hour, new.duration_hours, label);
        let id = entry.id;
        tracing::info!(
            entry_id = %id,
            device = %entry.device_id,
            label = %entry.label,
            start = %entry.start_at(),
            end = %entry.end_at(),
            "Entry added"
        );
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Synthesize an entry anchored at `now` for a manual start
    pub fn add_manual_entry(
        &mut self,
        device_id: &str,
        label: &str,
        duration_hours: f64,
        now: NaiveDateTime,
    ) -> ScheduleResult<EntryId> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(ValidationError::EmptyDevice.into());
        }
        let label = validate_label(label)?;
        let date = now.date();
        let start_hour = hour_of(now.time());
        validate_hours(start_hour, duration_hours)?;

        self.ensure_free(device_id, date, start_hour, duration_hours, None)?;

        let label = self.unique_label(&label, None);
        let entry = ScheduleEntry::new(device_id, date, start_hour, duration_hours, label);
        let id = entry.id;
        tracing::info!(entry_id = %id, device = %device_id, label = %entry.label, "Manual entry created");
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Validate and apply a partial edit
    pub fn edit_entry(
        &mut self,
        id: EntryId,
        edit: EntryEdit,
        now: NaiveDateTime,
    ) -> ScheduleResult<()> {
        let current = self
            .entries
            .get(&id)
            .ok_or(ScheduleError::EntryNotFound(id))?
            .clone();

        if current.status.is_terminal() || current.has_ended(now) {
            return Err(ValidationError::EntryFinished.into());
        }

        let started = current.has_started(now) || current.status != EntryStatus::Waiting;
        let mut candidate = current.clone();

        if let Some(device_id) = edit.device_id {
            let device_id = device_id.trim().to_string();
            if device_id.is_empty() {
                return Err(ValidationError::EmptyDevice.into());
            }
            candidate.device_id = device_id;
        }
        if let Some(date) = edit.date {
            candidate.date = date;
        }
        if let Some(start_hour) = edit.start_hour {
            candidate.start_hour = start_hour;
        }
        if let Some(duration_hours) = edit.duration_hours {
            candidate.duration_hours = duration_hours;
        }
        if let Some(label) = edit.label {
            candidate.label = validate_label(&label)?;
        }

        if started
            && (candidate.device_id != current.device_id
                || candidate.start_at() != current.start_at())
        {
            return Err(ValidationError::StartedEntryLocked.into());
        }

        validate_hours(candidate.start_hour, candidate.duration_hours)?;
        if !started && candidate.start_at() < now {
            return Err(ValidationError::StartInPast(candidate.start_at().to_string()).into());
        }
        if candidate.end_at() < now {
            return Err(ValidationError::EndBeforeNow(candidate.end_at().to_string()).into());
        }

        self.ensure_free(
            &candidate.device_id,
            candidate.date,
            candidate.start_hour,
            candidate.duration_hours,
            Some(id),
        )?;

        if candidate.label != current.label {
            candidate.label = self.unique_label(&candidate.label, Some(id));
        }

        tracing::info!(entry_id = %id, label = %candidate.label, window = %candidate.window_text(), "Entry edited");
        self.entries.insert(id, candidate);
        Ok(())
    }

    /// Remove a not-yet-started entry, keeping it on the undo stack
    pub fn delete_entry(&mut self, id: EntryId, now: NaiveDateTime) -> ScheduleResult<ScheduleEntry> {
        let entry = self.entries.get(&id).ok_or(ScheduleError::EntryNotFound(id))?;
        if entry.has_started(now) || entry.status != EntryStatus::Waiting {
            return Err(ValidationError::DeleteRefused.into());
        }

        let entry = self
            .entries
            .remove(&id)
            .ok_or(ScheduleError::EntryNotFound(id))?;
        self.push_undo(entry.clone());
        tracing::info!(entry_id = %id, label = %entry.label, "Entry deleted");
        Ok(entry)
    }

    fn push_undo(&mut self, entry: ScheduleEntry) {
        if self.undo_depth == 0 {
            return;
        }
        while self.undo.len() >= self.undo_depth {
            self.undo.pop_front();
        }
        self.undo.push_back(entry);
    }

    /// Number of deletions available for restoration
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Restore the most recent deletion after re-validating it
    pub fn undo_delete(&mut self, now: NaiveDateTime) -> ScheduleResult<EntryId> {
        let entry = self.undo.pop_back().ok_or(ScheduleError::NothingToRestore)?;

        let check = if entry.start_at() < now {
            Err(ValidationError::StartInPast(entry.start_at().to_string()).into())
        } else {
            self.ensure_free(
                &entry.device_id,
                entry.date,
                entry.start_hour,
                entry.duration_hours,
                Some(entry.id),
            )
        };

        if let Err(e) = check {
            self.undo.push_back(entry);
            return Err(e);
        }

        let mut entry = entry;
        entry.label = self.unique_label(&entry.label, Some(entry.id));
        let id = entry.id;
        tracing::info!(entry_id = %id, label = %entry.label, "Entry restored");
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Set an entry's status; returns whether it changed
    pub fn set_status(&mut self, id: EntryId, status: EntryStatus) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if entry.status != status => {
                tracing::debug!(entry_id = %id, from = %entry.status, to = %status, "Entry status changed");
                entry.status = status;
                true
            }
            _ => false,
        }
    }

    /// Record the advisory device status text on every entry of a device
    pub fn set_last_seen(&mut self, device_id: &str, text: &str) {
        for entry in self.entries.values_mut().filter(|e| e.device_id == device_id) {
            entry.last_seen_device_status = Some(text.to_string());
        }
    }

    /// End an entry early at `now`: truncate its duration and mark it stopped
    pub fn stop_early(&mut self, id: EntryId, now: NaiveDateTime) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        let elapsed = now - entry.start_at();
        if elapsed > Duration::zero() && now < entry.end_at() {
            entry.duration_hours = elapsed.num_seconds().max(1) as f64 / 3600.0;
        }
        entry.status = EntryStatus::Stopped;
        true
    }

    /// The unsettled entry on `device_id` whose window contains `now`
    pub fn active_on_device(&self, device_id: &str, now: NaiveDateTime) -> Option<&ScheduleEntry> {
        self.entries.values().find(|e| {
            e.device_id == device_id
                && !e.status.is_terminal()
                && e.start_at() <= now
                && now < e.end_at()
        })
    }

    /// Entries referencing devices not in `known`
    pub fn orphaned<'a>(&'a self, known: &HashSet<String>) -> Vec<&'a ScheduleEntry> {
        self.entries()
            .into_iter()
            .filter(|e| !known.contains(&e.device_id))
            .collect()
    }

    /// Move every entry of `from` onto `to`, refusing if any would conflict
    pub fn remap_device(&mut self, from: &str, to: &str) -> ScheduleResult<usize> {
        let to = to.trim();
        if to.is_empty() {
            return Err(ValidationError::EmptyDevice.into());
        }
        let moving: Vec<ScheduleEntry> = self
            .entries
            .values()
            .filter(|e| e.device_id == from)
            .cloned()
            .collect();

        let staying: Vec<&ScheduleEntry> =
            self.entries.values().filter(|e| e.device_id == to).collect();
        let index = OverlapIndex::new(staying);
        let mut labels = Vec::new();
        for entry in &moving {
            labels.extend(index.conflicting_labels(
                to,
                entry.date,
                entry.start_hour,
                entry.duration_hours,
                None,
            ));
        }
        if !labels.is_empty() {
            return Err(ScheduleError::conflict(to, labels));
        }

        for entry in &moving {
            if let Some(e) = self.entries.get_mut(&entry.id) {
                e.device_id = to.to_string();
            }
        }
        tracing::info!(from = %from, to = %to, count = moving.len(), "Entries remapped");
        Ok(moving.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
