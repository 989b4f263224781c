//! Device status polling
//!
//! [`parse_status`] maps raw `EncStatus` text onto a [`StatusCategory`].
//! [`DeviceStatusCache`] debounces queries per device, falls back to the last
//! recognised status when a response cannot be classified, and throttles
//! logging of unchanged responses.

use chrono::{DateTime, Local};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::protocol::EncoderController;

/// Default minimum spacing between two queries of one device
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(800);

/// Default interval for re-logging an unchanged response
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Status Category
// ============================================================================

/// Classified device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Waiting,
    Recording,
    Paused,
    Stopped,
    Preparing,
    Error,
    Unknown,
}

impl StatusCategory {
    /// Display colour for status views
    pub fn color_hint(&self) -> &'static str {
        match self {
            Self::Recording => "green",
            Self::Paused => "orange",
            Self::Stopped | Self::Waiting => "gray",
            Self::Preparing => "blue",
            Self::Error => "red",
            Self::Unknown => "black",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Preparing => "preparing",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Vocabulary checked in order; first match wins
const VOCABULARY: &[(&[&str], StatusCategory)] = &[
    (&["running", "runned"], StatusCategory::Recording),
    (&["paused"], StatusCategory::Paused),
    (&["stopped", "none", "idle"], StatusCategory::Stopped),
    (&["prepared", "preparing", "ready"], StatusCategory::Preparing),
    (&["error", "disconnect", "timeout"], StatusCategory::Error),
];

/// Classify a raw status response
pub fn parse_status(raw: &str) -> StatusCategory {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return StatusCategory::Unknown;
    }
    VOCABULARY
        .iter()
        .find(|(words, _)| words.iter().any(|w| lowered.contains(w)))
        .map(|(_, category)| *category)
        .unwrap_or(StatusCategory::Unknown)
}

/// Result of a status lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReading {
    pub category: StatusCategory,
    pub color_hint: &'static str,
    pub raw: String,
    pub at: DateTime<Local>,
}

impl StatusReading {
    fn new(category: StatusCategory, raw: String) -> Self {
        Self {
            category,
            color_hint: category.color_hint(),
            raw,
            at: Local::now(),
        }
    }
}

// ============================================================================
// Status Cache
// ============================================================================

#[derive(Debug, Default)]
struct DeviceState {
    last_raw: Option<String>,
    last_query: Option<Instant>,
    last_good: Option<StatusCategory>,
    last_log: Option<Instant>,
    last_reading: Option<StatusReading>,
}

/// Debounced, fallback-aware status lookups
pub struct DeviceStatusCache {
    controller: EncoderController,
    cooldown: Duration,
    log_interval: Duration,
    states: Mutex<HashMap<String, Arc<Mutex<DeviceState>>>>,
}

impl DeviceStatusCache {
    pub fn new(controller: EncoderController) -> Self {
        Self {
            controller,
            cooldown: DEFAULT_COOLDOWN,
            log_interval: DEFAULT_LOG_INTERVAL,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_log_interval(mut self, interval: Duration) -> Self {
        self.log_interval = interval;
        self
    }

    async fn state_for(&self, device: &str) -> Arc<Mutex<DeviceState>> {
        self.states
            .lock()
            .await
            .entry(device.to_string())
            .or_default()
            .clone()
    }

    /// Current status of one device, querying it only outside the cooldown
    pub async fn get_status(&self, device: &str) -> StatusReading {
        let shared = self.state_for(device).await;
        // Held across the query so concurrent callers inside the cooldown
        // see the first caller's result
        let mut guard = shared.lock().await;
        let state = &mut *guard;

        if let (Some(last), Some(reading)) = (state.last_query, state.last_reading.as_ref()) {
            if last.elapsed() < self.cooldown {
                return reading.clone();
            }
        }

        let raw = self.controller.status_text(device).await;
        let now = Instant::now();
        let changed = state.last_raw.as_deref() != Some(raw.as_str());
        state.last_query = Some(now);

        let unchanged = if changed {
            None
        } else {
            state.last_reading.as_ref().map(|r| r.category)
        };
        let category = match unchanged {
            Some(previous) => previous,
            None => {
                let parsed = parse_status(&raw);
                match (parsed, state.last_good) {
                    (StatusCategory::Unknown, Some(good)) => {
                        tracing::debug!(device = %device, raw = %raw, fallback = %good, "Unrecognised status, keeping last known");
                        good
                    }
                    (StatusCategory::Unknown, None) => StatusCategory::Unknown,
                    (parsed, _) => {
                        state.last_good = Some(parsed);
                        parsed
                    }
                }
            }
        };

        let log_due = state
            .last_log
            .map_or(true, |at| now.duration_since(at) >= self.log_interval);
        if changed || log_due {
            tracing::info!(device = %device, raw = %raw, category = %category, "EncStatus");
            state.last_log = Some(now);
        }

        state.last_raw = Some(raw.clone());
        let reading = StatusReading::new(category, raw);
        state.last_reading = Some(reading.clone());
        reading
    }

    /// Statuses of several devices, queried concurrently
    pub async fn refresh_all(&self, devices: &[String]) -> HashMap<String, StatusReading> {
        let readings = join_all(devices.iter().map(|d| self.get_status(d))).await;
        devices.iter().cloned().zip(readings).collect()
    }

    /// Last reading without querying
    pub async fn cached(&self, device: &str) -> Option<StatusReading> {
        let state = self.states.lock().await.get(device).cloned()?;
        let state = state.lock().await;
        state.last_reading.clone()
    }
}
