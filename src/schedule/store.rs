//! Durable schedule persistence
//!
//! The schedule is a pretty-printed JSON array of records. Older files may
//! lack ids, device names or status; those are filled in on load so the
//! rest of the crate only ever sees complete entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::entry::{validate_hours, EntryId, EntryStatus, ScheduleEntry};
use super::error::StoreError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// On-disk shape of one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    qdate: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    track_index: Option<usize>,

    start_hour: f64,

    duration: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_hour: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_qdate: Option<String>,

    label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> EntryStatus {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("waiting") => EntryStatus::Waiting,
        Some("recording") => EntryStatus::Recording,
        Some("stopped") => EntryStatus::Stopped,
        Some("ended") => EntryStatus::Ended,
        Some("error") => EntryStatus::Error,
        Some(other) => {
            tracing::warn!(status = %other, "Unknown stored status, treating as waiting");
            EntryStatus::Waiting
        }
    }
}

/// Loads and saves the schedule file
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    path: PathBuf,

    /// Device names in configured order, used to resolve legacy `track_index`
    device_order: Vec<String>,
}

impl ScheduleStore {
    /// Create a store for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            device_order: Vec::new(),
        }
    }

    /// Set the device order used for `track_index` records
    pub fn with_device_order(mut self, order: Vec<String>) -> Self {
        self.device_order = order;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_text(&self) -> String {
        self.path.display().to_string()
    }

    /// Load all entries; a missing file is an empty schedule
    pub async fn load(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "Schedule file not found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(self.path_text(), e)),
        };

        let entries = self.decode(&json)?;
        tracing::debug!(path = %self.path.display(), count = entries.len(), "Schedule loaded");
        Ok(entries)
    }

    /// Atomically replace the schedule file
    pub async fn save(&self, entries: &[ScheduleEntry]) -> Result<(), StoreError> {
        let json = self.encode(entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::io(tmp.display().to_string(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(self.path_text(), e))?;

        tracing::debug!(path = %self.path.display(), count = entries.len(), "Schedule saved");
        Ok(())
    }

    /// Serialize entries to the file format
    pub fn encode(&self, entries: &[ScheduleEntry]) -> Result<String, StoreError> {
        let records: Vec<StoredRecord> = entries
            .iter()
            .map(|entry| StoredRecord {
                id: Some(entry.id.to_string()),
                qdate: entry.date.format(DATE_FORMAT).to_string(),
                device_id: Some(entry.device_id.clone()),
                device_name: Some(entry.device_id.clone()),
                track_index: self.device_order.iter().position(|d| *d == entry.device_id),
                start_hour: entry.start_hour,
                duration: entry.duration_hours,
                end_hour: Some(entry.end_hour()),
                end_qdate: Some(entry.end_date().format(DATE_FORMAT).to_string()),
                label: entry.label.clone(),
                status: Some(entry.status.as_str().to_string()),
            })
            .collect();

        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Parse the file format, filling in fields older files lack
    pub fn decode(&self, json: &str) -> Result<Vec<ScheduleEntry>, StoreError> {
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<StoredRecord> = serde_json::from_str(json)?;

        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| self.to_entry(index, record))
            .collect()
    }

    fn to_entry(&self, index: usize, record: StoredRecord) -> Result<ScheduleEntry, StoreError> {
        let invalid = |reason: String| StoreError::InvalidRecord { index, reason };

        let date = NaiveDate::parse_from_str(record.qdate.trim(), DATE_FORMAT)
            .map_err(|e| invalid(format!("bad qdate '{}': {e}", record.qdate)))?;

        let device_id = record
            .device_id
            .filter(|d| !d.trim().is_empty())
            .or(record.device_name.filter(|d| !d.trim().is_empty()))
            .or_else(|| {
                record
                    .track_index
                    .and_then(|i| self.device_order.get(i).cloned())
            })
            .ok_or_else(|| invalid("no resolvable device".to_string()))?;

        validate_hours(record.start_hour, record.duration).map_err(|e| invalid(e.to_string()))?;

        let id = match record.id.as_deref() {
            Some(raw) => raw
                .parse::<EntryId>()
                .map_err(|e| invalid(format!("bad id '{raw}': {e}")))?,
            None => EntryId::new(),
        };

        let mut entry = ScheduleEntry::with_id(
            id,
            device_id,
            date,
            record.start_hour,
            record.duration,
            record.label,
        );
        entry.status = parse_status(record.status.as_deref());
        Ok(entry)
    }
}
