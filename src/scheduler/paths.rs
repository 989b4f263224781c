//! Recording and snapshot file layout
//!
//! Paths sent to devices are relative to the device's own roots and always
//! use forward slashes.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

use crate::schedule::EntryId;
use crate::utils::{file_stem_for_device, sanitize_filename};

/// Folder name for one recording day, `MM.dd.yyyy`
pub fn date_folder(date: NaiveDate) -> String {
    date.format("%m.%d.%Y").to_string()
}

/// Destination of a recording, `MM.dd.yyyy/MMdd_<label>`
pub fn recording_relative_path(date: NaiveDate, label: &str) -> String {
    format!(
        "{}/{}_{}",
        date_folder(date),
        date.format("%m%d"),
        sanitize_filename(label.trim())
    )
}

/// Where a device should write one still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTarget {
    pub device: String,
    /// Relative to the snapshot root, without extension, as sent to the device
    pub relative: String,
    /// Expected `.png` on the local filesystem
    pub file: PathBuf,
}

impl SnapshotTarget {
    fn new(root: &Path, device: &str, relative: String) -> Self {
        let mut file = root.to_path_buf();
        let mut parts = relative.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                file.push(part);
            } else {
                file.push(format!("{part}.png"));
            }
        }
        Self {
            device: device.to_string(),
            relative,
            file,
        }
    }

    /// Snapshot of a recording: `<MM.dd.yyyy>/img/<entry_id>_<HHMMSS>`
    pub fn for_entry(
        root: &Path,
        device: &str,
        date: NaiveDate,
        entry_id: EntryId,
        now: NaiveDateTime,
    ) -> Self {
        let relative = format!(
            "{}/img/{}_{}",
            date_folder(date),
            entry_id,
            now.format("%H%M%S")
        );
        Self::new(root, device, relative)
    }

    /// Live preview of a device: `preview/<device>_<HHMMSS>`
    pub fn for_preview(root: &Path, device: &str, now: NaiveDateTime) -> Self {
        let relative = format!(
            "{}/{}_{}",
            PREVIEW_DIR,
            file_stem_for_device(device),
            now.format("%H%M%S")
        );
        Self::new(root, device, relative)
    }
}

/// Subdirectory of the snapshot root holding previews
pub const PREVIEW_DIR: &str = "preview";
