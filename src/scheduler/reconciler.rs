//! Tick reconciliation
//!
//! Each tick compares "now" against every entry's absolute window and the
//! execution ledger, and emits the device actions that are due. The
//! computation works on a plain-value [`ReconcileSnapshot`] so it can run on
//! a worker without touching shared state.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::engine::EngineMessage;
use super::workers::WorkerPool;
use crate::schedule::{EntryId, ScheduleEntry};

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Start,
    Stop,
}

/// One due device action
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub entry_id: EntryId,
    pub device_id: String,
    pub label: String,
    pub date: NaiveDate,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Copy of the fields of one entry the reconciler needs
#[derive(Debug, Clone, PartialEq)]
pub struct EntryWindow {
    pub id: EntryId,
    pub device_id: String,
    pub label: String,
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl From<&ScheduleEntry> for EntryWindow {
    fn from(entry: &ScheduleEntry) -> Self {
        Self {
            id: entry.id,
            device_id: entry.device_id.clone(),
            label: entry.label.clone(),
            date: entry.date,
            start: entry.start_at(),
            end: entry.end_at(),
        }
    }
}

/// Immutable input of one reconciliation
#[derive(Debug, Clone, Default)]
pub struct ReconcileSnapshot {
    pub windows: Vec<EntryWindow>,
    pub started: HashSet<EntryId>,
    pub stopped: HashSet<EntryId>,
}

impl ReconcileSnapshot {
    /// Capture entries and ledger sets; fully settled entries are left out
    pub fn capture<'a>(
        entries: impl IntoIterator<Item = &'a ScheduleEntry>,
        started: &HashSet<EntryId>,
        stopped: &HashSet<EntryId>,
    ) -> Self {
        let mut snapshot = Self::default();
        for entry in entries {
            let is_started = started.contains(&entry.id);
            let is_stopped = stopped.contains(&entry.id);
            if is_started && is_stopped {
                continue;
            }
            if is_started {
                snapshot.started.insert(entry.id);
            }
            if is_stopped {
                snapshot.stopped.insert(entry.id);
            }
            snapshot.windows.push(EntryWindow::from(entry));
        }
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Actions due at `now`; `Start` precedes `Stop` for the same entry
///
/// An entry whose stop was already applied never starts again.
pub fn compute_actions(snapshot: &ReconcileSnapshot, now: NaiveDateTime) -> Vec<Action> {
    let mut actions = Vec::new();
    for window in &snapshot.windows {
        let action = |kind| Action {
            kind,
            entry_id: window.id,
            device_id: window.device_id.clone(),
            label: window.label.clone(),
            date: window.date,
        };
        if window.start <= now
            && !snapshot.started.contains(&window.id)
            && !snapshot.stopped.contains(&window.id)
        {
            actions.push(action(ActionKind::Start));
        }
        if now >= window.end && !snapshot.stopped.contains(&window.id) {
            actions.push(action(ActionKind::Stop));
        }
    }
    actions
}

// ============================================================================
// Reconciler
// ============================================================================

/// Result of a worker-side reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub now: NaiveDateTime,
    pub actions: Vec<Action>,
}

/// Clears the in-flight flag when the worker finishes, even by panic
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs [`compute_actions`] on the worker pool, one computation at a time
#[derive(Debug, Clone)]
pub struct Reconciler {
    workers: WorkerPool,
    in_flight: Arc<AtomicBool>,
}

impl Reconciler {
    pub fn new(workers: WorkerPool) -> Self {
        Self {
            workers,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a computation unless one is running; returns whether it started
    ///
    /// The outcome is delivered as [`EngineMessage::Reconciled`].
    pub fn dispatch(
        &self,
        snapshot: ReconcileSnapshot,
        now: NaiveDateTime,
        tx: mpsc::Sender<EngineMessage>,
    ) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Reconciliation still running, skipping tick");
            return false;
        }

        let guard = InFlight(self.in_flight.clone());
        self.workers.spawn(async move {
            let outcome = {
                let _guard = guard;
                ReconcileOutcome {
                    now,
                    actions: compute_actions(&snapshot, now),
                }
            };
            if tx.send(EngineMessage::Reconciled(outcome)).await.is_err() {
                tracing::debug!("Engine loop gone, dropping reconcile outcome");
            }
        });
        true
    }
}
