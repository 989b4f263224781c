//! Integration tests for the scheduling engine
//!
//! These tests drive the engine with a manual clock against an in-memory
//! encoder and verify:
//! - Start/stop are issued exactly once per entry
//! - Failed starts and stops are retried, stops only a bounded number of times
//! - Manual start/stop and their persistence
//! - Reloading schedule and device files edited by another process

mod common;

use common::{at, day, engine, test_settings, ManualClock, MockEncoder};
use recsched::device::{Device, DeviceRegistry};
use recsched::schedule::{EntryStatus, NewEntry, ScheduleError, ScheduleStore};
use recsched::scheduler::{EngineSettings, SchedulerError};
use std::time::Duration;

fn new_entry(device: &str, start_hour: f64, duration_hours: f64, label: &str) -> NewEntry {
    NewEntry {
        device_id: device.to_string(),
        date: day(),
        start_hour,
        duration_hours,
        label: label.to_string(),
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_one_minute_entry_starts_once_and_stops_once() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(10, 0, 0));
    let mut engine = engine(dir.path(), encoder.clone(), &clock, test_settings());

    let id = engine
        .add_entry(new_entry("Enc1", 10.0, 0.0167, "Bulletin"))
        .await
        .unwrap();
    assert_eq!(engine.get(id).unwrap().end_at(), at(10, 1, 0));

    let report = engine.tick().await;
    assert_eq!(report.started, vec![id]);
    assert_eq!(encoder.count("Setfile "), 1);
    assert_eq!(encoder.count("Start "), 1);
    assert!(encoder
        .commands()
        .contains(&"Setfile \"Enc1\" 1 \"03.04.2024/0304_Bulletin\"".to_string()));

    // Same instant again: nothing new
    assert!(engine.tick().await.is_empty());

    clock.advance_secs(30);
    assert!(engine.tick().await.is_empty());
    assert_eq!(engine.get(id).unwrap().status, EntryStatus::Recording);

    clock.advance_secs(30);
    let report = engine.tick().await;
    assert_eq!(report.stopped, vec![id]);
    assert_eq!(engine.get(id).unwrap().status, EntryStatus::Ended);

    clock.advance_secs(60);
    assert!(engine.tick().await.is_empty());
    assert_eq!(encoder.count("Start "), 1);
    assert_eq!(encoder.count("Stop "), 1);
}

#[tokio::test]
async fn test_late_tick_starts_before_stopping() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(9, 0, 0));
    let mut engine = engine(dir.path(), encoder.clone(), &clock, test_settings());

    let id = engine
        .add_entry(new_entry("Enc1", 9.5, 0.25, "Short"))
        .await
        .unwrap();

    // The engine was not ticking during the whole window
    clock.advance_secs(3600);
    let report = engine.tick().await;
    assert_eq!(report.started, vec![id]);
    assert_eq!(report.stopped, vec![id]);

    let commands = encoder.commands();
    let start = commands.iter().position(|c| c.starts_with("Start ")).unwrap();
    let stop = commands.iter().position(|c| c.starts_with("Stop ")).unwrap();
    assert!(start < stop);
}

#[tokio::test]
async fn test_failed_start_is_retried_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(10, 0, 0));
    let mut engine = engine(dir.path(), encoder.clone(), &clock, test_settings());
    let id = engine
        .add_entry(new_entry("Enc1", 10.0, 1.0, "News"))
        .await
        .unwrap();

    encoder.fail("Start");
    let report = engine.tick().await;
    assert_eq!(report.failed, vec![id]);
    assert_eq!(engine.get(id).unwrap().status, EntryStatus::Error);
    assert!(!engine.ledger().is_started(id));

    encoder.heal();
    clock.advance_secs(1);
    let report = engine.tick().await;
    assert_eq!(report.started, vec![id]);
    assert_eq!(engine.get(id).unwrap().status, EntryStatus::Recording);
    assert_eq!(encoder.count("Start "), 2);
}

#[tokio::test]
async fn test_stop_failures_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(10, 0, 0));
    let settings = EngineSettings {
        max_stop_attempts: 3,
        ..test_settings()
    };
    let mut engine = engine(dir.path(), encoder.clone(), &clock, settings);
    let id = engine
        .add_entry(new_entry("Enc1", 10.0, 0.5, "News"))
        .await
        .unwrap();
    engine.tick().await;

    encoder.fail("Stop");
    clock.advance_secs(1800);
    for _ in 0..6 {
        engine.tick().await;
        clock.advance_secs(1);
    }

    assert_eq!(encoder.count("Stop "), 3);
    assert_eq!(engine.get(id).unwrap().status, EntryStatus::Error);
    assert!(engine.ledger().is_stopped(id));
}

#[tokio::test]
async fn test_start_never_sent_after_window_closed() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(10, 0, 0));
    let mut engine = engine(dir.path(), encoder.clone(), &clock, test_settings());
    let id = engine
        .add_entry(new_entry("Enc1", 10.0, 0.5, "News"))
        .await
        .unwrap();

    // The device refuses to start for the whole window
    encoder.fail("Start");
    assert_eq!(engine.tick().await.failed, vec![id]);
    clock.advance_secs(1800);
    let report = engine.tick().await;
    assert_eq!(report.stopped, vec![id]);
    assert!(engine.ledger().is_stopped(id));
    let starts = encoder.count("Start ");

    clock.advance_secs(1);
    engine.tick().await;
    assert_eq!(encoder.count("Start "), starts);

    encoder.heal();
    clock.advance_secs(3600);
    assert!(engine.tick().await.is_empty());
    assert_eq!(encoder.count("Start "), starts);
    assert_eq!(encoder.count("Stop "), 1);
    assert_eq!(engine.get(id).unwrap().status, EntryStatus::Ended);
    assert!(!engine.ledger().is_started(id));
}

#[tokio::test]
async fn test_run_loop_applies_due_entries() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(10, 0, 0));
    let settings = EngineSettings {
        tick: Duration::from_millis(50),
        status_refresh: Duration::ZERO,
        ..test_settings()
    };
    let mut engine = engine(dir.path(), encoder.clone(), &clock, settings);
    let id = engine
        .add_entry(new_entry("Enc1", 10.0, 1.0, "Live"))
        .await
        .unwrap();

    engine
        .run(tokio::time::sleep(Duration::from_millis(400)))
        .await
        .unwrap();

    assert_eq!(encoder.count("Start "), 1);
    assert_eq!(engine.get(id).unwrap().status, EntryStatus::Recording);

    // The throttled status change was flushed on shutdown
    let stored = ScheduleStore::new(dir.path().join("schedule.json"))
        .load()
        .await
        .unwrap();
    assert_eq!(stored[0].status, EntryStatus::Recording);
}

#[tokio::test]
async fn test_status_changes_are_throttled() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(10, 0, 0));
    let mut engine = engine(dir.path(), encoder, &clock, test_settings());
    engine
        .add_entry(new_entry("Enc1", 10.0, 1.0, "News"))
        .await
        .unwrap();

    engine.tick().await;
    let store = ScheduleStore::new(dir.path().join("schedule.json"));
    assert_eq!(store.load().await.unwrap()[0].status, EntryStatus::Waiting);

    engine.shutdown().await.unwrap();
    assert_eq!(store.load().await.unwrap()[0].status, EntryStatus::Recording);
}

// ============================================================================
// Manual control
// ============================================================================

#[tokio::test]
async fn test_manual_start_survives_restart_and_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(14, 0, 0));

    let id = {
        let mut first = engine(dir.path(), encoder.clone(), &clock, test_settings());
        let id = first.force_start("Enc2", Some("Breaking")).await.unwrap();
        assert_eq!(first.get(id).unwrap().status, EntryStatus::Recording);
        id
    };

    clock.advance_secs(600);
    let mut second = engine(dir.path(), encoder.clone(), &clock, test_settings());
    assert_eq!(second.load().await.unwrap(), 1);
    assert!(second.ledger().is_started(id));
    assert!(second.tick().await.is_empty());
    assert_eq!(encoder.count("Start "), 1);

    assert_eq!(second.force_stop("Enc2").await.unwrap(), id);
    let entry = second.get(id).unwrap();
    assert_eq!(entry.status, EntryStatus::Stopped);
    assert_eq!(entry.end_at(), at(14, 10, 0));

    assert!(matches!(
        second.force_stop("Enc2").await,
        Err(SchedulerError::NotRecording { .. })
    ));
    assert!(matches!(
        second.force_start("Enc9", None).await,
        Err(SchedulerError::UnknownDevice { .. })
    ));
}

#[tokio::test]
async fn test_manual_start_refused_on_busy_device() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::at(at(10, 0, 0));
    let mut engine = engine(dir.path(), MockEncoder::new(), &clock, test_settings());
    engine
        .add_entry(new_entry("Enc1", 10.5, 1.0, "Scheduled"))
        .await
        .unwrap();

    let result = engine.force_start("Enc1", None).await;
    assert!(matches!(
        result,
        Err(SchedulerError::Schedule(ScheduleError::Conflict { .. }))
    ));
}

// ============================================================================
// Editing through the engine
// ============================================================================

#[tokio::test]
async fn test_overlap_queries() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::at(at(8, 0, 0));
    let mut engine = engine(dir.path(), MockEncoder::new(), &clock, test_settings());
    let a = engine
        .add_entry(new_entry("Enc1", 9.0, 2.0, "A"))
        .await
        .unwrap();

    assert!(engine.is_overlap("Enc1", day(), 10.0, 1.0, None));
    assert!(!engine.is_overlap("Enc1", day(), 11.0, 1.0, None));
    assert!(!engine.is_overlap("Enc2", day(), 10.0, 1.0, None));
    assert!(!engine.is_overlap("Enc1", day(), 10.0, 1.0, Some(a)));
    assert_eq!(
        engine.conflicting_labels("Enc1", day(), 8.5, 1.0, None),
        vec!["A".to_string()]
    );
}

#[tokio::test]
async fn test_delete_and_undo() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::at(at(8, 0, 0));
    let mut engine = engine(dir.path(), MockEncoder::new(), &clock, test_settings());
    let id = engine
        .add_entry(new_entry("Enc1", 9.0, 1.0, "A"))
        .await
        .unwrap();

    engine.delete_entry(id).await.unwrap();
    assert!(engine.get(id).is_none());

    assert_eq!(engine.undo_delete().await.unwrap(), id);
    assert!(engine.get(id).is_some());
    assert!(engine.undo_delete().await.is_err());
}

#[tokio::test]
async fn test_labels_are_made_unique() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::at(at(8, 0, 0));
    let mut engine = engine(dir.path(), MockEncoder::new(), &clock, test_settings());
    engine
        .add_entry(new_entry("Enc1", 9.0, 1.0, "News"))
        .await
        .unwrap();
    let second = engine
        .add_entry(new_entry("Enc2", 9.0, 1.0, "News"))
        .await
        .unwrap();
    assert_eq!(engine.get(second).unwrap().label, "News_1");
}

#[tokio::test]
async fn test_reload_picks_up_external_edits() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(8, 0, 0));

    let mut daemon = engine(dir.path(), encoder.clone(), &clock, test_settings());
    daemon.load().await.unwrap();
    assert!(!daemon.reload_if_changed().await.unwrap());

    let mut cli = engine(dir.path(), encoder, &clock, test_settings());
    cli.load().await.unwrap();
    let id = cli
        .add_entry(new_entry("Enc2", 9.0, 1.0, "Added elsewhere"))
        .await
        .unwrap();

    assert!(daemon.reload_if_changed().await.unwrap());
    assert_eq!(daemon.get(id).unwrap().label, "Added elsewhere");

    clock.advance_secs(3600);
    assert_eq!(daemon.tick().await.started, vec![id]);
}

#[tokio::test]
async fn test_reload_stops_removed_running_entry() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(8, 0, 0));
    let mut daemon = engine(dir.path(), encoder.clone(), &clock, test_settings());
    let id = daemon
        .add_entry(new_entry("Enc1", 9.0, 1.0, "Deleted elsewhere"))
        .await
        .unwrap();

    clock.advance_secs(3600);
    assert_eq!(daemon.tick().await.started, vec![id]);
    daemon.save().await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    ScheduleStore::new(dir.path().join("schedule.json"))
        .save(&[])
        .await
        .unwrap();

    assert!(daemon.reload_if_changed().await.unwrap());
    assert!(daemon.get(id).is_none());
    assert_eq!(encoder.count("Stop "), 1);
    assert!(!daemon.ledger().is_started(id));

    clock.advance_secs(3600);
    assert!(daemon.tick().await.is_empty());
    assert_eq!(encoder.count("Stop "), 1);
}

#[tokio::test]
async fn test_force_stop_after_device_removed() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(14, 0, 0));
    let device_file = dir.path().join("encoders.json");
    let mut daemon = engine(dir.path(), encoder.clone(), &clock, test_settings())
        .with_device_file(&device_file);

    let id = daemon.force_start("Enc1", Some("Live")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    DeviceRegistry::from_devices([Device::new("Enc2", "127.0.0.1", 32108)])
        .save(&device_file)
        .await
        .unwrap();
    assert!(daemon.reload_if_changed().await.unwrap());
    assert!(!daemon.registry().contains("Enc1"));

    clock.advance_secs(60);
    assert_eq!(daemon.force_stop("Enc1").await.unwrap(), id);
    assert_eq!(encoder.count("Stop "), 1);
    assert_eq!(daemon.get(id).unwrap().status, EntryStatus::Stopped);

    assert!(matches!(
        daemon.force_stop("Enc1").await,
        Err(SchedulerError::UnknownDevice { .. })
    ));
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn test_status_queries() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new();
    let clock = ManualClock::at(at(8, 0, 0));
    let mut engine = engine(dir.path(), encoder.clone(), &clock, test_settings());
    let id = engine
        .add_entry(new_entry("Enc1", 9.0, 1.0, "A"))
        .await
        .unwrap();

    encoder.set_status("Encoder Running");
    let reading = engine.get_status("Enc1").await.unwrap();
    assert_eq!(reading.category, recsched::device::StatusCategory::Recording);
    assert_eq!(
        engine.get(id).unwrap().last_seen_device_status.as_deref(),
        Some("Encoder Running")
    );

    let all = engine.refresh_statuses().await;
    assert_eq!(all.len(), 2);
    assert!(matches!(
        engine.get_status("Nope").await,
        Err(SchedulerError::UnknownDevice { .. })
    ));
}
