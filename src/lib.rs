//! recsched - Unattended recording scheduler for network encoders
//!
//! Drives start/stop of remote recording devices ("encoders") from a timetable
//! of recording windows, keeps a status view in sync with each device, and
//! never issues the same start or stop twice for one window.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`schedule`] - Entry data model, overlap detection, editing and persistence
//! - [`device`] - Device registry, TCP control links, protocol and status polling
//! - [`scheduler`] - Reconciliation, action application, snapshots and the engine
//! - [`error`] - Unified error type
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use recsched::config::Config;
//! use recsched::scheduler::Engine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut engine = Engine::from_config(&config).await?;
//!     engine.load().await?;
//!     // engine.run(shutdown).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod schedule;
pub mod scheduler;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::device::{
        Device, DeviceRegistry, EncoderController, LinkPool, StatusCategory, StatusReading,
    };
    pub use crate::error::{Error, ErrorCategory, RecschedErrorTrait, Result};
    pub use crate::schedule::{
        EntryEdit, EntryId, EntryStatus, NewEntry, ScheduleBook, ScheduleEntry, ScheduleStore,
    };
    pub use crate::scheduler::{Engine, EngineSettings};
}

// Direct re-exports for convenience
pub use schedule::{EntryId, EntryStatus, ScheduleEntry};
pub use scheduler::Engine;
