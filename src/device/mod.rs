//! Encoder device layer
//!
//! Everything that touches the network lives here.
//!
//! # Modules
//!
//! - [`registry`] - Configured devices and their JSON file
//! - [`link`] - One persistent TCP control connection
//! - [`pool`] - Cached links, retry-once and the [`CommandTransport`] seam
//! - [`protocol`] - Command builders and [`EncoderController`] operations
//! - [`status`] - Status classification and the debounced [`DeviceStatusCache`]
//! - [`error`] - Device error types
//!
//! # Layering
//!
//! ```text
//! DeviceStatusCache ──┐
//!                     ├──▶ EncoderController ──▶ dyn CommandTransport
//! ActionApplier ──────┘                               │
//!                                                     ▼
//!                                          LinkPool ──▶ DeviceLink (TCP)
//! ```

pub mod error;
pub mod link;
pub mod pool;
pub mod protocol;
pub mod registry;
pub mod status;

pub use error::{DeviceError, DeviceResult};
pub use link::{resolve_encoding, DeviceLink, LinkSettings};
pub use pool::{is_synthetic_error, synthetic_error, CommandTransport, LinkPool};
pub use protocol::{is_success, parse_device_list, EncoderController};
pub use registry::{Device, DeviceRegistry, DEFAULT_PORT};
pub use status::{parse_status, DeviceStatusCache, StatusCategory, StatusReading};
