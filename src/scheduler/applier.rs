//! Applying reconciled actions
//!
//! The [`ActionApplier`] is the only code that issues start/stop commands for
//! scheduled entries and the only writer of entry status. It runs on the task
//! that owns the [`ScheduleBook`] and the [`ExecutionLedger`].

use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

use super::paths::recording_relative_path;
use super::reconciler::{Action, ActionKind};
use crate::device::{DeviceResult, EncoderController};
use crate::schedule::{EntryId, EntryStatus, ScheduleBook, ScheduleEntry};

/// Default number of stop attempts before giving up on an entry
pub const DEFAULT_MAX_STOP_ATTEMPTS: u32 = 3;

/// Default minimum spacing between two schedule saves
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Execution Ledger
// ============================================================================

/// Which entries already had their start and stop applied
#[derive(Debug, Clone, Default)]
pub struct ExecutionLedger {
    started: HashSet<EntryId>,
    stopped: HashSet<EntryId>,
    stop_failures: HashMap<EntryId, u32>,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the ledger for entries loaded at startup
    ///
    /// Finished entries are settled without commands. An entry persisted as
    /// recording whose window is still open is assumed to be recording already.
    /// Waiting entries inside their window are left unsettled so they start.
    pub fn seed<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a ScheduleEntry>,
        now: NaiveDateTime,
    ) -> Vec<EntryId> {
        let mut finished = Vec::new();
        for entry in entries {
            if entry.status.is_terminal() || entry.has_ended(now) {
                self.started.insert(entry.id);
                self.stopped.insert(entry.id);
                if !entry.status.is_terminal() {
                    finished.push(entry.id);
                }
            } else if entry.status == EntryStatus::Recording {
                self.started.insert(entry.id);
            }
        }
        finished
    }

    pub fn is_started(&self, id: EntryId) -> bool {
        self.started.contains(&id)
    }

    pub fn is_stopped(&self, id: EntryId) -> bool {
        self.stopped.contains(&id)
    }

    pub fn mark_started(&mut self, id: EntryId) {
        self.started.insert(id);
    }

    pub fn mark_stopped(&mut self, id: EntryId) {
        self.stopped.insert(id);
        self.stop_failures.remove(&id);
    }

    /// Count a failed stop; returns attempts so far
    pub fn record_stop_failure(&mut self, id: EntryId) -> u32 {
        let attempts = self.stop_failures.entry(id).or_insert(0);
        *attempts += 1;
        *attempts
    }

    pub fn stop_failures(&self, id: EntryId) -> u32 {
        self.stop_failures.get(&id).copied().unwrap_or(0)
    }

    /// Drop all knowledge of an entry
    pub fn forget(&mut self, id: EntryId) {
        self.started.remove(&id);
        self.stopped.remove(&id);
        self.stop_failures.remove(&id);
    }

    pub fn started(&self) -> &HashSet<EntryId> {
        &self.started
    }

    pub fn stopped(&self) -> &HashSet<EntryId> {
        &self.stopped
    }

    /// Entries whose start was applied but whose stop was not
    pub fn running(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.started
            .iter()
            .copied()
            .filter(|id| !self.stopped.contains(id))
    }
}

// ============================================================================
// Save Throttle
// ============================================================================

/// Rate-limits persistence of status changes
#[derive(Debug, Clone)]
pub struct SaveThrottle {
    interval: Duration,
    last_save: Option<Instant>,
    dirty: bool,
}

impl SaveThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_save: None,
            dirty: false,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a pending change may be written now
    pub fn is_due(&self, now: Instant) -> bool {
        self.dirty
            && self
                .last_save
                .map_or(true, |last| now.duration_since(last) >= self.interval)
    }

    pub fn saved(&mut self, now: Instant) {
        self.last_save = Some(now);
        self.dirty = false;
    }
}

// ============================================================================
// Action Applier
// ============================================================================

/// Snapshot to take after a successful start
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRequest {
    pub entry_id: EntryId,
    pub device_id: String,
    pub date: chrono::NaiveDate,
}

/// What one batch of actions did
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub started: Vec<EntryId>,
    pub stopped: Vec<EntryId>,
    pub failed: Vec<EntryId>,
    pub skipped: usize,
    pub snapshots: Vec<SnapshotRequest>,
    pub status_changed: bool,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.failed.is_empty()
    }
}

/// Executes start and stop actions against devices
#[derive(Clone)]
pub struct ActionApplier {
    controller: EncoderController,
    max_stop_attempts: u32,
    snapshot_on_start: bool,
}

impl ActionApplier {
    pub fn new(controller: EncoderController) -> Self {
        Self {
            controller,
            max_stop_attempts: DEFAULT_MAX_STOP_ATTEMPTS,
            snapshot_on_start: false,
        }
    }

    pub fn with_max_stop_attempts(mut self, attempts: u32) -> Self {
        self.max_stop_attempts = attempts.max(1);
        self
    }

    pub fn with_snapshot_on_start(mut self, enabled: bool) -> Self {
        self.snapshot_on_start = enabled;
        self
    }

    pub fn controller(&self) -> &EncoderController {
        &self.controller
    }

    /// Apply actions in order, re-checking each against current state
    pub async fn apply(
        &self,
        actions: &[Action],
        book: &mut ScheduleBook,
        ledger: &mut ExecutionLedger,
        now: NaiveDateTime,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();

        for action in actions {
            // The book may have changed since the snapshot was taken
            let Some(entry) = book.get(action.entry_id).cloned() else {
                report.skipped += 1;
                continue;
            };

            match action.kind {
                ActionKind::Start => {
                    if ledger.is_started(entry.id)
                        || ledger.is_stopped(entry.id)
                        || !entry.has_started(now)
                    {
                        report.skipped += 1;
                        continue;
                    }
                    self.apply_start(&entry, book, ledger, &mut report).await;
                }
                ActionKind::Stop => {
                    if ledger.is_stopped(entry.id) || !entry.has_ended(now) {
                        report.skipped += 1;
                        continue;
                    }
                    self.apply_stop(&entry, book, ledger, &mut report).await;
                }
            }
        }

        report
    }

    /// Run the start sequence for one entry
    pub async fn apply_start(
        &self,
        entry: &ScheduleEntry,
        book: &mut ScheduleBook,
        ledger: &mut ExecutionLedger,
        report: &mut ApplyReport,
    ) {
        let path = recording_relative_path(entry.date, &entry.label);
        match self.controller.start_recording(&entry.device_id, &path).await {
            Ok(()) => {
                ledger.mark_started(entry.id);
                report.status_changed |= book.set_status(entry.id, EntryStatus::Recording);
                report.started.push(entry.id);
                tracing::info!(entry_id = %entry.id, device = %entry.device_id, label = %entry.label, path = %path, "Entry started");
                if self.snapshot_on_start {
                    report.snapshots.push(SnapshotRequest {
                        entry_id: entry.id,
                        device_id: entry.device_id.clone(),
                        date: entry.date,
                    });
                }
            }
            Err(e) => {
                report.status_changed |= book.set_status(entry.id, EntryStatus::Error);
                report.failed.push(entry.id);
                tracing::error!(entry_id = %entry.id, device = %entry.device_id, error = %e, "Start failed, will retry next tick");
            }
        }
    }

    async fn apply_stop(
        &self,
        entry: &ScheduleEntry,
        book: &mut ScheduleBook,
        ledger: &mut ExecutionLedger,
        report: &mut ApplyReport,
    ) {
        match self.controller.stop_recording(&entry.device_id).await {
            Ok(()) => {
                ledger.mark_stopped(entry.id);
                report.status_changed |= book.set_status(entry.id, EntryStatus::Ended);
                report.stopped.push(entry.id);
                tracing::info!(entry_id = %entry.id, device = %entry.device_id, label = %entry.label, "Entry ended");
            }
            Err(e) => {
                let attempts = ledger.record_stop_failure(entry.id);
                report.status_changed |= book.set_status(entry.id, EntryStatus::Error);
                report.failed.push(entry.id);
                if attempts >= self.max_stop_attempts {
                    ledger.mark_stopped(entry.id);
                    tracing::error!(entry_id = %entry.id, device = %entry.device_id, attempts, error = %e, "Stop failed, giving up");
                } else {
                    tracing::warn!(entry_id = %entry.id, device = %entry.device_id, attempts, error = %e, "Stop failed, will retry next tick");
                }
            }
        }
    }

    /// Stop a running entry now, truncating it to the stop instant
    pub async fn force_stop(
        &self,
        entry_id: EntryId,
        book: &mut ScheduleBook,
        ledger: &mut ExecutionLedger,
        now: NaiveDateTime,
    ) -> DeviceResult<()> {
        let device = match book.get(entry_id) {
            Some(entry) => entry.device_id.clone(),
            None => return Ok(()),
        };
        self.controller.stop_recording(&device).await?;
        ledger.mark_started(entry_id);
        ledger.mark_stopped(entry_id);
        book.stop_early(entry_id, now);
        tracing::info!(entry_id = %entry_id, device = %device, "Entry stopped early");
        Ok(())
    }
}
