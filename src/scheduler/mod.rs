//! Recording execution engine
//!
//! This module turns the schedule into device actions. Once per tick the
//! [`Engine`] captures a read-only [`ReconcileSnapshot`] of the schedule and
//! the execution ledger, a worker computes which entries must start or stop,
//! and the result is applied back on the engine task by the
//! [`ActionApplier`].
//!
//! # Architecture
//!
//! ```text
//!   editing (CLI) ──► ScheduleBook ──► ScheduleStore
//!                         │  ▲
//!              snapshot   │  │ status
//!                         ▼  │
//!   ┌──────────┐   mpsc  ┌───┴──────────┐      ┌───────────────┐
//!   │  Worker  │ ──────► │    Engine    │ ───► │ ActionApplier │ ──► devices
//!   │   pool   │ ◄────── │  (run loop)  │      └───────────────┘
//!   └──────────┘  spawn  └──────────────┘
//!     reconcile
//!     status refresh
//!     snapshots
//! ```
//!
//! # Guarantees
//!
//! - At most one reconciliation is in flight; a tick arriving while one runs
//!   is skipped.
//! - Every entry receives at most one successful `Start` and one terminal
//!   `Stop`.
//! - Stop failures are retried on later ticks up to a bounded number of
//!   attempts, after which the entry is left in `Error`.
//! - Status changes are persisted at most once per save interval, and flushed
//!   on shutdown.
//!
//! # Example
//!
//! ```ignore
//! use recsched::config::Config;
//! use recsched::scheduler::Engine;
//!
//! let config = Config::load(None)?;
//! let mut engine = Engine::from_config(&config).await?;
//! engine.load().await?;
//! engine.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

pub mod applier;
pub mod engine;
pub mod error;
pub mod paths;
pub mod reconciler;
pub mod snapshot;
pub mod workers;

// Re-export main types
pub use applier::{ActionApplier, ApplyReport, ExecutionLedger, SaveThrottle, SnapshotRequest};
pub use engine::{system_clock, Clock, Engine, EngineMessage, EngineSettings, MANUAL_LABEL};
pub use error::{SchedulerError, SchedulerResult};
pub use paths::{date_folder, recording_relative_path, SnapshotTarget};
pub use reconciler::{
    compute_actions, Action, ActionKind, EntryWindow, ReconcileOutcome, ReconcileSnapshot,
    Reconciler,
};
pub use snapshot::{SnapshotCoordinator, SnapshotSettings};
pub use workers::WorkerPool;
