//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::Path;
use std::sync::{Arc, Mutex};

use recsched::device::{CommandTransport, Device, DeviceRegistry, EncoderController};
use recsched::schedule::ScheduleStore;
use recsched::scheduler::{Clock, Engine, EngineSettings};

/// In-memory encoder server that records every command
#[derive(Default)]
pub struct MockEncoder {
    commands: Mutex<Vec<(String, String)>>,
    /// Command prefixes answered with a synthetic error
    failing: Mutex<Vec<String>>,
    status: Mutex<String>,
}

impl MockEncoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new("Stopped".to_string()),
            ..Default::default()
        })
    }

    /// Fail every command starting with `prefix`
    pub fn fail(&self, prefix: &str) {
        self.failing.lock().unwrap().push(prefix.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn set_status(&self, text: &str) {
        *self.status.lock().unwrap() = text.to_string();
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Number of recorded commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandTransport for MockEncoder {
    async fn execute(&self, device: &str, command: &str) -> String {
        self.commands
            .lock()
            .unwrap()
            .push((device.to_string(), command.to_string()));

        let failing = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()));
        if failing {
            return "ERROR: connection refused".to_string();
        }
        if command.starts_with("EncStatus") {
            return self.status.lock().unwrap().clone();
        }
        "OK".to_string()
    }
}

/// Clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.0.lock().unwrap();
        *now += Duration::seconds(secs);
    }

    pub fn clock(&self) -> Clock {
        let inner = self.0.clone();
        Arc::new(move || *inner.lock().unwrap())
    }
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, s).unwrap()
}

pub fn registry() -> DeviceRegistry {
    DeviceRegistry::from_devices([
        Device::new("Enc1", "127.0.0.1", 32108),
        Device::new("Enc2", "127.0.0.1", 32108).with_display_name("Studio B"),
    ])
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        snapshot_on_start: false,
        ..EngineSettings::default()
    }
}

/// Engine over a mock encoder with its schedule file in `dir`
pub fn engine(
    dir: &Path,
    encoder: Arc<MockEncoder>,
    clock: &ManualClock,
    settings: EngineSettings,
) -> Engine {
    Engine::new(
        EncoderController::new(encoder),
        registry(),
        ScheduleStore::new(dir.join("schedule.json")),
        settings,
    )
    .with_clock(clock.clock())
    .with_roots(dir.join("recordings"), dir.join("snapshots"))
}
