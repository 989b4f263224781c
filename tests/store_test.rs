//! Schedule file persistence tests

use chrono::NaiveDate;
use recsched::schedule::{EntryStatus, ScheduleEntry, ScheduleStore, StoreError};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn sample() -> Vec<ScheduleEntry> {
    let mut late = ScheduleEntry::new("Enc1", day(1), 23.0, 2.0, "Late show");
    late.status = EntryStatus::Recording;
    let mut news = ScheduleEntry::new("Enc2", day(2), 9.25, 0.75, "新聞");
    news.status = EntryStatus::Ended;
    let odd = ScheduleEntry::new("Enc1", day(3), 13.0 + 7.0 / 60.0, 1.0 / 3.0, "Odd minutes");
    vec![late, news, odd]
}

#[tokio::test]
async fn test_round_trip_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("schedule.json");
    let store = ScheduleStore::new(&path);

    store.save(&sample()).await.unwrap();
    let first = std::fs::read_to_string(&path).unwrap();

    let loaded = store.load().await.unwrap();
    store.save(&loaded).await.unwrap();
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(loaded, sample_with_ids(&loaded));
    assert!(!dir.path().join("nested").join("schedule.json.tmp").exists());
}

/// The sample, re-created with the ids the store handed back
fn sample_with_ids(loaded: &[ScheduleEntry]) -> Vec<ScheduleEntry> {
    sample()
        .into_iter()
        .zip(loaded)
        .map(|(mut entry, stored)| {
            entry.id = stored.id;
            entry
        })
        .collect()
}

#[tokio::test]
async fn test_rollover_fields_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    let store = ScheduleStore::new(&path);
    store.save(&sample()[..1]).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let record = &json[0];
    assert_eq!(record["qdate"], "2024-01-01");
    assert_eq!(record["end_qdate"], "2024-01-02");
    assert_eq!(record["end_hour"], 1.0);
    assert_eq!(record["status"], "recording");
}

#[tokio::test]
async fn test_legacy_records_are_completed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    std::fs::write(
        &path,
        r#"[
            {"qdate": "2024-01-05", "track_index": 1, "start_hour": 6.5, "duration": 1.0, "label": "Morning"},
            {"qdate": "2024-01-05", "device_name": "Enc1", "start_hour": 8.0, "duration": 0.5, "label": "Brief", "status": "ENDED"}
        ]"#,
    )
    .unwrap();

    let store = ScheduleStore::new(&path).with_device_order(vec!["Enc1".into(), "Enc2".into()]);
    let entries = store.load().await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].device_id, "Enc2");
    assert_eq!(entries[0].status, EntryStatus::Waiting);
    assert_eq!(entries[1].device_id, "Enc1");
    assert_eq!(entries[1].status, EntryStatus::Ended);
    assert_ne!(entries[0].id, entries[1].id);
}

#[tokio::test]
async fn test_unresolvable_device_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    std::fs::write(
        &path,
        r#"[{"qdate": "2024-01-05", "track_index": 7, "start_hour": 6.5, "duration": 1.0, "label": "Lost"}]"#,
    )
    .unwrap();

    let result = ScheduleStore::new(&path).load().await;
    assert!(matches!(
        result,
        Err(StoreError::InvalidRecord { index: 0, .. })
    ));
}

#[tokio::test]
async fn test_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScheduleStore::new(dir.path().join("absent.json"));
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_out_of_range_window_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.json");
    let store = ScheduleStore::new(&path);

    for record in [
        r#"{"qdate": "2024-03-04", "device_id": "Enc1", "start_hour": 9, "duration": 1e10, "label": "x"}"#,
        r#"{"qdate": "2024-03-04", "device_id": "Enc1", "start_hour": 25, "duration": 1.0, "label": "x"}"#,
        r#"{"qdate": "2024-03-04", "device_id": "Enc1", "start_hour": 9, "duration": -1.0, "label": "x"}"#,
    ] {
        std::fs::write(&path, format!("[{record}]")).unwrap();
        let result = store.load().await;
        assert!(
            matches!(result, Err(StoreError::InvalidRecord { index: 0, .. })),
            "accepted {record}"
        );
    }
}
