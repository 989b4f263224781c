//! The scheduling engine
//!
//! [`Engine`] is the explicit context object of the application. It owns the
//! [`ScheduleBook`], the [`ExecutionLedger`] and the store, and is the only
//! place that mutates them. Worker tasks receive value copies and report back
//! through an [`EngineMessage`] channel drained by [`Engine::run`].

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use super::applier::{
    ActionApplier, ApplyReport, ExecutionLedger, SaveThrottle, SnapshotRequest,
    DEFAULT_MAX_STOP_ATTEMPTS, DEFAULT_SAVE_INTERVAL,
};
use super::error::{SchedulerError, SchedulerResult};
use super::paths::recording_relative_path;
use super::reconciler::{compute_actions, Action, ReconcileOutcome, ReconcileSnapshot, Reconciler};
use super::snapshot::{SnapshotCoordinator, SnapshotSettings};
use super::workers::{WorkerPool, DEFAULT_WORKERS};
use crate::config::Config;
use crate::device::status::{DEFAULT_COOLDOWN, DEFAULT_LOG_INTERVAL};
use crate::device::{
    DeviceRegistry, DeviceStatusCache, EncoderController, LinkPool, LinkSettings, StatusReading,
};
use crate::schedule::{
    EntryEdit, EntryId, EntryStatus, NewEntry, ScheduleBook, ScheduleEntry, ScheduleStore,
    ValidationError, DEFAULT_UNDO_DEPTH,
};

/// Source of "now" for every scheduling decision
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Local wall-clock time
pub fn system_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// Label of entries created by a manual start without one
pub const MANUAL_LABEL: &str = "manual";

const CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Settings
// ============================================================================

/// Engine timing and policy knobs
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick: Duration,
    /// Zero disables background status refresh
    pub status_refresh: Duration,
    pub status_cooldown: Duration,
    pub status_log_interval: Duration,
    pub save_interval: Duration,
    pub workers: usize,
    pub undo_depth: usize,
    pub max_stop_attempts: u32,
    pub manual_duration_hours: f64,
    pub snapshot_on_start: bool,
    pub snapshot: SnapshotSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            status_refresh: Duration::from_secs(5),
            status_cooldown: DEFAULT_COOLDOWN,
            status_log_interval: DEFAULT_LOG_INTERVAL,
            save_interval: DEFAULT_SAVE_INTERVAL,
            workers: DEFAULT_WORKERS,
            undo_depth: DEFAULT_UNDO_DEPTH,
            max_stop_attempts: DEFAULT_MAX_STOP_ATTEMPTS,
            manual_duration_hours: 1.0,
            snapshot_on_start: true,
            snapshot: SnapshotSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick: config.tick_interval(),
            status_refresh: config.status_refresh_interval(),
            status_cooldown: config.status_cooldown(),
            status_log_interval: config.status_log_interval(),
            save_interval: config.save_interval(),
            workers: config.engine.workers,
            undo_depth: config.engine.undo_depth,
            max_stop_attempts: config.engine.max_stop_attempts,
            manual_duration_hours: config.engine.manual_duration_hours,
            snapshot_on_start: config.engine.snapshot_on_start,
            snapshot: SnapshotSettings {
                timeout: config.snapshot_timeout(),
                poll_interval: config.snapshot_poll_interval(),
                keep_minutes: config.snapshot.keep_minutes,
            },
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Results sent from worker tasks back to the engine
#[derive(Debug)]
pub enum EngineMessage {
    /// Actions computed for one tick
    Reconciled(ReconcileOutcome),

    /// Background status refresh finished
    Statuses(HashMap<String, StatusReading>),

    /// Post-start snapshot finished
    SnapshotDone {
        entry_id: EntryId,
        device: String,
        path: Option<PathBuf>,
    },
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    settings: EngineSettings,
    book: ScheduleBook,
    ledger: ExecutionLedger,
    store: ScheduleStore,
    registry: DeviceRegistry,
    device_file: Option<PathBuf>,
    pool: Option<Arc<LinkPool>>,
    status: Arc<DeviceStatusCache>,
    applier: ActionApplier,
    snapshots: SnapshotCoordinator,
    recording_root: PathBuf,
    workers: WorkerPool,
    reconciler: Reconciler,
    throttle: SaveThrottle,
    tx: mpsc::Sender<EngineMessage>,
    rx: mpsc::Receiver<EngineMessage>,
    cancel: Arc<AtomicBool>,
    status_in_flight: Arc<AtomicBool>,
    clock: Clock,
    schedule_mtime: Option<SystemTime>,
    device_mtime: Option<SystemTime>,
}

impl Engine {
    /// Create an engine around an already configured controller
    pub fn new(
        controller: EncoderController,
        registry: DeviceRegistry,
        store: ScheduleStore,
        settings: EngineSettings,
    ) -> Self {
        let workers = WorkerPool::new(settings.workers);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let status = DeviceStatusCache::new(controller.clone())
            .with_cooldown(settings.status_cooldown)
            .with_log_interval(settings.status_log_interval);
        let applier = ActionApplier::new(controller.clone())
            .with_max_stop_attempts(settings.max_stop_attempts)
            .with_snapshot_on_start(settings.snapshot_on_start);
        let snapshots =
            SnapshotCoordinator::new(controller, "snapshots").with_settings(settings.snapshot);

        Self {
            book: ScheduleBook::new(settings.undo_depth),
            ledger: ExecutionLedger::new(),
            store,
            registry,
            device_file: None,
            pool: None,
            status: Arc::new(status),
            applier,
            snapshots,
            recording_root: PathBuf::from("recordings"),
            reconciler: Reconciler::new(workers.clone()),
            workers,
            throttle: SaveThrottle::new(settings.save_interval),
            tx,
            rx,
            cancel: Arc::new(AtomicBool::new(false)),
            status_in_flight: Arc::new(AtomicBool::new(false)),
            clock: system_clock(),
            schedule_mtime: None,
            device_mtime: None,
            settings,
        }
    }

    /// Build the full stack from configuration: registry, link pool, store
    pub async fn from_config(config: &Config) -> SchedulerResult<Self> {
        let registry = DeviceRegistry::load(&config.paths.device_file).await?;
        let link = LinkSettings::new(
            config.connect_timeout(),
            config.read_timeout(),
            &config.link.encoding,
        )?;
        let pool = Arc::new(LinkPool::new(registry.clone(), link));
        let controller = EncoderController::new(pool.clone())
            .with_channel(config.link.channel)
            .with_success_token(config.link.success_token.clone());
        let store = ScheduleStore::new(&config.paths.schedule_file)
            .with_device_order(registry.names());

        tracing::debug!(
            devices = registry.len(),
            schedule = %config.paths.schedule_file.display(),
            encoding = %link.encoding.name(),
            "Engine configured"
        );

        Ok(
            Self::new(controller, registry, store, EngineSettings::from_config(config))
                .with_pool(pool)
                .with_device_file(&config.paths.device_file)
                .with_roots(&config.paths.recording_root, &config.paths.snapshot_root),
        )
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_pool(mut self, pool: Arc<LinkPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Watch `path` for device configuration changes while running
    pub fn with_device_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_file = Some(path.into());
        self
    }

    pub fn with_roots(
        mut self,
        recording_root: impl Into<PathBuf>,
        snapshot_root: impl Into<PathBuf>,
    ) -> Self {
        self.recording_root = recording_root.into();
        self.snapshots = SnapshotCoordinator::new(
            self.applier.controller().clone(),
            snapshot_root.into(),
        )
        .with_settings(self.settings.snapshot);
        self
    }

    /// Current time according to the engine clock
    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ExecutionLedger {
        &self.ledger
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Load the schedule and settle entries that finished while not running
    ///
    /// Returns the number of entries loaded.
    pub async fn load(&mut self) -> SchedulerResult<usize> {
        let entries = self.store.load().await?;
        self.schedule_mtime = modified(self.store.path()).await;
        if let Some(path) = &self.device_file {
            self.device_mtime = modified(path).await;
        }

        self.book.replace_entries(entries);
        self.ledger = ExecutionLedger::new();
        let now = self.now();
        let finished = self.ledger.seed(self.book.entries(), now);
        for id in finished {
            if self.book.set_status(id, EntryStatus::Ended) {
                self.throttle.mark_dirty();
            }
        }

        tracing::info!(
            entries = self.book.len(),
            running = self.ledger.running().count(),
            file = %self.store.path().display(),
            "Schedule loaded"
        );
        Ok(self.book.len())
    }

    /// Write the schedule now
    pub async fn save(&mut self) -> SchedulerResult<()> {
        self.store.save(&self.book.to_vec()).await?;
        self.throttle.saved(Instant::now());
        // Our own write must not look like an external edit
        self.schedule_mtime = modified(self.store.path()).await;
        Ok(())
    }

    async fn flush_if_due(&mut self) {
        if !self.throttle.is_due(Instant::now()) {
            return;
        }
        if let Err(e) = self.save().await {
            tracing::error!(error = %e, "Failed to persist schedule");
        }
    }

    /// Reload files edited by another process
    ///
    /// The in-memory status of an entry wins unless the file records a
    /// terminal status. New entries are seeded into the ledger; removed
    /// entries are forgotten, after stopping their device if they were
    /// recording.
    pub async fn reload_if_changed(&mut self) -> SchedulerResult<bool> {
        let mut reloaded = false;

        if let Some(path) = self.device_file.clone() {
            let mtime = modified(&path).await;
            if mtime.is_some() && mtime != self.device_mtime {
                let registry = DeviceRegistry::load(&path).await?;
                self.device_mtime = mtime;
                tracing::info!(devices = registry.len(), "Device configuration reloaded");
                if let Some(pool) = &self.pool {
                    pool.update_registry(registry.clone()).await;
                }
                self.registry = registry;
                reloaded = true;
            }
        }

        let mtime = modified(self.store.path()).await;
        if mtime.is_none() || mtime == self.schedule_mtime {
            return Ok(reloaded);
        }

        let loaded = self.store.load().await?;
        self.schedule_mtime = mtime;
        let now = self.now();

        let loaded_ids: HashSet<EntryId> = loaded.iter().map(|e| e.id).collect();
        let removed: Vec<EntryId> = self.book.ids().filter(|id| !loaded_ids.contains(id)).collect();

        let mut merged = Vec::with_capacity(loaded.len());
        let mut added = Vec::new();
        for mut entry in loaded {
            match self.book.get(entry.id) {
                Some(current) => {
                    if !entry.status.is_terminal() {
                        entry.status = current.status;
                    }
                    entry.last_seen_device_status = current.last_seen_device_status.clone();
                }
                None => added.push(entry.clone()),
            }
            merged.push(entry);
        }

        for id in &removed {
            let running = self.ledger.is_started(*id) && !self.ledger.is_stopped(*id);
            let device = self.book.get(*id).map(|e| e.device_id.clone());
            if let (true, Some(device)) = (running, device) {
                match self.applier.controller().stop_recording(&device).await {
                    Ok(()) => {
                        tracing::info!(entry_id = %id, device = %device, "Running entry removed from schedule file, stopped")
                    }
                    Err(e) => {
                        tracing::error!(entry_id = %id, device = %device, error = %e, "Running entry removed from schedule file, stop failed")
                    }
                }
            }
            self.ledger.forget(*id);
        }

        self.book.replace_entries(merged);

        let settled: Vec<EntryId> = self
            .book
            .entries()
            .into_iter()
            .filter(|e| e.status.is_terminal())
            .map(|e| e.id)
            .collect();
        for id in settled {
            self.ledger.mark_started(id);
            self.ledger.mark_stopped(id);
        }

        for id in self.ledger.seed(&added, now) {
            self.book.set_status(id, EntryStatus::Ended);
        }

        tracing::info!(
            entries = self.book.len(),
            added = added.len(),
            removed = removed.len(),
            "Schedule file changed, reloaded"
        );
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Core API
    // ------------------------------------------------------------------------

    /// Entries ordered by start
    pub fn entries(&self) -> Vec<&ScheduleEntry> {
        self.book.entries()
    }

    pub fn get(&self, id: EntryId) -> Option<&ScheduleEntry> {
        self.book.get(id)
    }

    /// Recording destination of an entry, below the recording root
    pub fn recording_path(&self, id: EntryId) -> Option<PathBuf> {
        let entry = self.book.get(id)?;
        let relative = recording_relative_path(entry.date, &entry.label);
        Some(self.recording_root.join(relative))
    }

    fn ensure_device(&self, device: &str) -> SchedulerResult<()> {
        if self.registry.contains(device) {
            Ok(())
        } else {
            Err(SchedulerError::unknown_device(device))
        }
    }

    pub async fn add_entry(&mut self, new: NewEntry) -> SchedulerResult<EntryId> {
        self.ensure_device(new.device_id.trim())?;
        let id = self.book.add_entry(new, self.now())?;
        self.save().await?;
        Ok(id)
    }

    pub async fn edit_entry(&mut self, id: EntryId, edit: EntryEdit) -> SchedulerResult<()> {
        if let Some(device) = edit.device_id.as_deref() {
            self.ensure_device(device.trim())?;
        }
        self.book.edit_entry(id, edit, self.now())?;
        self.save().await
    }

    /// Delete an entry that has not started
    pub async fn delete_entry(&mut self, id: EntryId) -> SchedulerResult<ScheduleEntry> {
        if self.ledger.is_started(id) {
            return Err(ValidationError::DeleteRefused.into());
        }
        let entry = self.book.delete_entry(id, self.now())?;
        self.ledger.forget(id);
        self.save().await?;
        Ok(entry)
    }

    /// Restore the most recently deleted entry
    pub async fn undo_delete(&mut self) -> SchedulerResult<EntryId> {
        let id = self.book.undo_delete(self.now())?;
        self.save().await?;
        Ok(id)
    }

    pub fn is_overlap(
        &self,
        device_id: &str,
        date: NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> bool {
        self.book
            .is_overlap(device_id, date, start_hour, duration_hours, exclude_id)
    }

    pub fn conflicting_labels(
        &self,
        device_id: &str,
        date: NaiveDate,
        start_hour: f64,
        duration_hours: f64,
        exclude_id: Option<EntryId>,
    ) -> Vec<String> {
        self.book
            .conflicting_labels(device_id, date, start_hour, duration_hours, exclude_id)
    }

    /// Entries whose device is no longer configured
    pub fn orphaned(&self) -> Vec<&ScheduleEntry> {
        self.book.orphaned(&self.registry.name_set())
    }

    /// Move all entries of one device to another
    pub async fn remap_device(&mut self, from: &str, to: &str) -> SchedulerResult<usize> {
        self.ensure_device(to.trim())?;
        let moved = self.book.remap_device(from, to)?;
        if moved > 0 {
            self.save().await?;
        }
        Ok(moved)
    }

    /// Start recording on `device` now with a synthesized entry
    ///
    /// The entry is kept even when the device refuses; it then carries status
    /// `Error` and the next tick retries the start.
    pub async fn force_start(
        &mut self,
        device: &str,
        label: Option<&str>,
    ) -> SchedulerResult<EntryId> {
        self.ensure_device(device)?;
        let now = self.now();
        let label = label.filter(|l| !l.trim().is_empty()).unwrap_or(MANUAL_LABEL);
        let id = self.book.add_manual_entry(
            device,
            label,
            self.settings.manual_duration_hours,
            now,
        )?;

        let Some(entry) = self.book.get(id).cloned() else {
            return Err(crate::schedule::ScheduleError::EntryNotFound(id).into());
        };
        let mut report = ApplyReport::default();
        self.applier
            .apply_start(&entry, &mut self.book, &mut self.ledger, &mut report)
            .await;
        self.spawn_snapshots(&report.snapshots, now);
        self.save().await?;
        Ok(id)
    }

    /// Stop whatever entry is recording on `device`
    ///
    /// Works for a device that left the registry while its entry runs.
    pub async fn force_stop(&mut self, device: &str) -> SchedulerResult<EntryId> {
        let now = self.now();
        let running = self
            .ledger
            .running()
            .find(|id| self.book.get(*id).is_some_and(|e| e.device_id == device))
            .or_else(|| self.book.active_on_device(device, now).map(|e| e.id));
        let Some(id) = running else {
            self.ensure_device(device)?;
            return Err(SchedulerError::NotRecording {
                device: device.to_string(),
            });
        };

        self.applier
            .force_stop(id, &mut self.book, &mut self.ledger, now)
            .await?;
        self.save().await?;
        Ok(id)
    }

    /// Status of one device, through the debounce cache
    pub async fn get_status(&mut self, device: &str) -> SchedulerResult<StatusReading> {
        self.ensure_device(device)?;
        let reading = self.status.get_status(device).await;
        self.book.set_last_seen(device, &reading.raw);
        Ok(reading)
    }

    /// Query every configured device
    pub async fn refresh_statuses(&mut self) -> HashMap<String, StatusReading> {
        let readings = self.status.refresh_all(&self.registry.names()).await;
        self.record_statuses(&readings);
        readings
    }

    fn record_statuses(&mut self, readings: &HashMap<String, StatusReading>) {
        for (device, reading) in readings {
            self.book.set_last_seen(device, &reading.raw);
        }
    }

    /// Clean old previews of `device` and capture a new one
    pub async fn capture_preview(&self, device: &str) -> SchedulerResult<Option<PathBuf>> {
        self.ensure_device(device)?;
        Ok(self
            .snapshots
            .capture_preview(device, self.now(), &self.cancel)
            .await)
    }

    pub async fn latest_preview(&self, device: &str) -> Option<PathBuf> {
        self.snapshots.latest_preview(device).await
    }

    // ------------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------------

    fn snapshot(&self) -> ReconcileSnapshot {
        ReconcileSnapshot::capture(
            self.book.entries(),
            self.ledger.started(),
            self.ledger.stopped(),
        )
    }

    /// Compute and apply due actions inline
    pub async fn tick(&mut self) -> ApplyReport {
        let now = self.now();
        let actions = compute_actions(&self.snapshot(), now);
        self.apply_actions(&actions, now).await
    }

    async fn apply_actions(&mut self, actions: &[Action], now: NaiveDateTime) -> ApplyReport {
        let report = self
            .applier
            .apply(actions, &mut self.book, &mut self.ledger, now)
            .await;
        if report.status_changed {
            self.throttle.mark_dirty();
        }
        if !report.is_empty() {
            tracing::debug!(
                started = report.started.len(),
                stopped = report.stopped.len(),
                failed = report.failed.len(),
                skipped = report.skipped,
                "Actions applied"
            );
        }
        self.spawn_snapshots(&report.snapshots, now);
        self.flush_if_due().await;
        report
    }

    fn spawn_snapshots(&self, requests: &[SnapshotRequest], now: NaiveDateTime) {
        for request in requests {
            let target =
                self.snapshots
                    .entry_target(&request.device_id, request.date, request.entry_id, now);
            let coordinator = self.snapshots.clone();
            let cancel = self.cancel.clone();
            let tx = self.tx.clone();
            let entry_id = request.entry_id;
            self.workers.spawn(async move {
                let path = coordinator.capture(&target, &cancel).await;
                let message = EngineMessage::SnapshotDone {
                    entry_id,
                    device: target.device,
                    path,
                };
                if tx.send(message).await.is_err() {
                    tracing::debug!(entry_id = %entry_id, "Engine loop gone, dropping snapshot result");
                }
            });
        }
    }

    fn dispatch_reconcile(&self) {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return;
        }
        self.reconciler.dispatch(snapshot, self.now(), self.tx.clone());
    }

    fn dispatch_status_refresh(&self) {
        if self.registry.is_empty() {
            return;
        }
        if self.status_in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("Status refresh still running, skipping");
            return;
        }

        let devices = self.registry.names();
        let cache = self.status.clone();
        let in_flight = self.status_in_flight.clone();
        let tx = self.tx.clone();
        self.workers.spawn(async move {
            let readings = cache.refresh_all(&devices).await;
            in_flight.store(false, Ordering::Release);
            if tx.send(EngineMessage::Statuses(readings)).await.is_err() {
                tracing::debug!("Engine loop gone, dropping status refresh");
            }
        });
    }

    async fn handle_message(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Reconciled(outcome) => {
                if outcome.actions.is_empty() {
                    return;
                }
                // The applier re-checks every action against the current time
                let now = self.now();
                self.apply_actions(&outcome.actions, now).await;
            }
            EngineMessage::Statuses(readings) => self.record_statuses(&readings),
            EngineMessage::SnapshotDone {
                entry_id,
                device,
                path,
            } => match path {
                Some(path) => {
                    tracing::info!(entry_id = %entry_id, device = %device, file = %path.display(), "Entry snapshot captured")
                }
                None => tracing::warn!(entry_id = %entry_id, device = %device, "Entry snapshot missing"),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------------

    /// Drive the schedule until `shutdown` resolves
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> SchedulerResult<()> {
        let mut tick = tokio::time::interval(self.settings.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let refresh_enabled = !self.settings.status_refresh.is_zero();
        let mut refresh = tokio::time::interval(self.settings.status_refresh.max(self.settings.tick));
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        tracing::info!(
            tick_ms = self.settings.tick.as_millis() as u64,
            devices = self.registry.len(),
            entries = self.book.len(),
            "Engine running"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = self.reload_if_changed().await {
                        tracing::error!(error = %e, "Failed to reload changed files");
                    }
                    self.dispatch_reconcile();
                    self.flush_if_due().await;
                }
                _ = refresh.tick(), if refresh_enabled => {
                    self.dispatch_status_refresh();
                }
                Some(message) = self.rx.recv() => {
                    self.handle_message(message).await;
                }
            }
        }

        self.shutdown().await
    }

    /// Cancel snapshots, flush pending state and close device links
    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        self.cancel.store(true, Ordering::Release);
        self.workers.close();

        let result = if self.throttle.is_dirty() {
            self.save().await
        } else {
            Ok(())
        };

        if let Some(pool) = &self.pool {
            pool.close_all().await;
        }
        tracing::info!("Engine stopped");
        result
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
}
