//! Still-image capture
//!
//! A capture asks the device to write a PNG and then waits for the file to
//! appear on the shared filesystem. Waiting is bounded by a timeout and can be
//! cancelled through a shared flag; every failure resolves to `None`.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

use super::paths::{SnapshotTarget, PREVIEW_DIR};
use crate::device::EncoderController;
use crate::schedule::EntryId;
use crate::utils::file_stem_for_device;

/// Default overall wait for the image file
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(6);

/// Default filesystem poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default preview retention
pub const DEFAULT_KEEP_MINUTES: u64 = 10;

/// Timing of captures
#[derive(Debug, Clone, Copy)]
pub struct SnapshotSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub keep_minutes: u64,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SNAPSHOT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            keep_minutes: DEFAULT_KEEP_MINUTES,
        }
    }
}

/// Captures entry snapshots and device previews
#[derive(Clone)]
pub struct SnapshotCoordinator {
    controller: EncoderController,
    root: PathBuf,
    settings: SnapshotSettings,
}

impl SnapshotCoordinator {
    pub fn new(controller: EncoderController, root: impl Into<PathBuf>) -> Self {
        Self {
            controller,
            root: root.into(),
            settings: SnapshotSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SnapshotSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_target(
        &self,
        device: &str,
        date: chrono::NaiveDate,
        entry_id: EntryId,
        now: NaiveDateTime,
    ) -> SnapshotTarget {
        SnapshotTarget::for_entry(&self.root, device, date, entry_id, now)
    }

    pub fn preview_target(&self, device: &str, now: NaiveDateTime) -> SnapshotTarget {
        SnapshotTarget::for_preview(&self.root, device, now)
    }

    /// Request an image and wait for it; `None` on timeout, cancel or error
    pub async fn capture(&self, target: &SnapshotTarget, cancel: &AtomicBool) -> Option<PathBuf> {
        if let Some(dir) = target.file.parent() {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                tracing::warn!(device = %target.device, dir = %dir.display(), error = %e, "Cannot create snapshot directory");
                return None;
            }
        }

        if let Err(e) = self
            .controller
            .request_snapshot(&target.device, &target.relative)
            .await
        {
            tracing::warn!(device = %target.device, error = %e, "Snapshot request failed");
            return None;
        }

        let deadline = Instant::now() + self.settings.timeout;
        loop {
            if cancel.load(Ordering::Acquire) {
                tracing::debug!(device = %target.device, "Snapshot cancelled");
                return None;
            }
            if tokio::fs::try_exists(&target.file).await.unwrap_or(false) {
                tracing::info!(device = %target.device, file = %target.file.display(), "Snapshot saved");
                return Some(target.file.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    device = %target.device,
                    file = %target.file.display(),
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "Snapshot file did not appear"
                );
                return None;
            }
            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }

    /// Clean stale previews of `device`, then capture a fresh one
    pub async fn capture_preview(
        &self,
        device: &str,
        now: NaiveDateTime,
        cancel: &AtomicBool,
    ) -> Option<PathBuf> {
        self.cleanup_previews(device).await;
        let target = self.preview_target(device, now);
        self.capture(&target, cancel).await
    }

    fn preview_dir(&self) -> PathBuf {
        self.root.join(PREVIEW_DIR)
    }

    /// Preview files of `device` with their modification times
    async fn previews(&self, device: &str) -> Vec<(PathBuf, SystemTime)> {
        let prefix = format!("{}_", file_stem_for_device(device));
        let mut found = Vec::new();

        let mut dir = match tokio::fs::read_dir(self.preview_dir()).await {
            Ok(dir) => dir,
            Err(_) => return found,
        };
        while let Ok(Some(item)) = dir.next_entry().await {
            let name = item.file_name().to_string_lossy().into_owned();
            let is_preview = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".png"))
                .is_some_and(|stamp| stamp.len() == 6 && stamp.chars().all(|c| c.is_ascii_digit()));
            if !is_preview {
                continue;
            }
            if let Ok(modified) = item.metadata().await.and_then(|m| m.modified()) {
                found.push((item.path(), modified));
            }
        }
        found
    }

    /// Delete previews of `device` older than the retention; returns the count
    pub async fn cleanup_previews(&self, device: &str) -> usize {
        let keep = Duration::from_secs(self.settings.keep_minutes * 60);
        let now = SystemTime::now();
        let mut removed = 0;

        for (path, modified) in self.previews(device).await {
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= keep {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(file = %path.display(), "Removed stale preview");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Cannot remove stale preview")
                }
            }
        }
        removed
    }

    /// Newest preview image of `device`
    pub async fn latest_preview(&self, device: &str) -> Option<PathBuf> {
        self.previews(device)
            .await
            .into_iter()
            .max_by_key(|(_, modified)| *modified)
            .map(|(path, _)| path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CommandTransport;
    use std::sync::Arc;

    /// Writes the requested PNG like a real encoder sharing the filesystem
    struct WritingEncoder {
        root: PathBuf,
        write: bool,
    }

    #[async_trait::async_trait]
    impl CommandTransport for WritingEncoder {
        async fn execute(&self, _device: &str, command: &str) -> String {
            if let Some(rest) = command.strip_prefix("SetSnapshotFileName ") {
                let relative = rest.rsplit('"').nth(1).unwrap_or_default();
                if self.write {
                    let file = self.root.join(format!("{relative}.png"));
                    std::fs::write(file, b"png").unwrap();
                }
            }
            "OK".to_string()
        }
    }

    fn coordinator(root: &Path, write: bool) -> SnapshotCoordinator {
        let transport = Arc::new(WritingEncoder {
            root: root.to_path_buf(),
            write,
        });
        SnapshotCoordinator::new(EncoderController::new(transport), root).with_settings(
            SnapshotSettings {
                timeout: Duration::from_millis(200),
                poll_interval: Duration::from_millis(10),
                keep_minutes: 10,
            },
        )
    }

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_capture_finds_file() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path(), true);
        let cancel = AtomicBool::new(false);

        let path = coord.capture_preview("Enc 1", now(), &cancel).await;
        assert_eq!(path, Some(dir.path().join("preview").join("Enc_1_120000.png")));
        assert_eq!(coord.latest_preview("Enc 1").await, path);
    }

    #[tokio::test]
    async fn test_capture_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path(), false);
        let cancel = AtomicBool::new(false);

        let started = std::time::Instant::now();
        assert!(coord.capture_preview("Enc 1", now(), &cancel).await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_capture_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator(dir.path(), false);
        let cancel = AtomicBool::new(true);

        let started = std::time::Instant::now();
        assert!(coord.capture_preview("Enc 1", now(), &cancel).await.is_none());
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_fresh_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let preview = dir.path().join("preview");
        std::fs::create_dir_all(&preview).unwrap();
        std::fs::write(preview.join("Enc_1_101010.png"), b"x").unwrap();
        std::fs::write(preview.join("Enc_10_101010.png"), b"x").unwrap();

        let coord = coordinator(dir.path(), false);
        assert_eq!(coord.cleanup_previews("Enc 1").await, 0);
        assert!(preview.join("Enc_1_101010.png").exists());

        let mut expired = coordinator(dir.path(), false);
        expired.settings.keep_minutes = 0;
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(expired.cleanup_previews("Enc 1").await, 1);
        assert!(preview.join("Enc_10_101010.png").exists());
    }
}
