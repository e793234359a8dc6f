//! Shared status record as seen by a separate observer

use std::path::Path;
use std::sync::Arc;

use cdrip::core::{FileStatusStore, SharedStatus, StatusSnapshot, StatusStore};
use tempfile::TempDir;

fn file_status(path: &Path) -> SharedStatus {
    SharedStatus::new(Arc::new(FileStatusStore::new(path)))
}

#[test]
fn test_clear_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("status.json");
    let status = file_status(&path);

    status.update_cd("Folge 1", "Die drei ???", None).unwrap();
    status.update_progress("Ripping", 35, Some(3), Some(8)).unwrap();
    assert!(!status.get_status().is_cleared());

    status.clear().unwrap();

    let snapshot = status.get_status();
    assert!(snapshot.is_cleared());
    assert!(snapshot.last_update.is_some());
}

#[test]
fn test_repeated_progress_only_moves_timestamp() {
    let temp = TempDir::new().unwrap();
    let status = file_status(&temp.path().join("status.json"));

    status.update_progress("Encoding", 60, Some(2), Some(7)).unwrap();
    let first = status.get_status();
    status.update_progress("Encoding", 60, Some(2), Some(7)).unwrap();
    let second = status.get_status();

    assert!(second.last_update >= first.last_update);
    assert_eq!(
        StatusSnapshot {
            last_update: None,
            ..first
        },
        StatusSnapshot {
            last_update: None,
            ..second
        }
    );
}

#[test]
fn test_observer_reads_writer_updates() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("status.json");

    let writer = file_status(&path);
    let observer = FileStatusStore::new(&path);

    writer.update_progress("Tagging", 85, Some(5), Some(8)).unwrap();
    writer.set_processing(false).unwrap();

    let snapshot = observer.load().unwrap();
    assert_eq!(snapshot.current_step.as_deref(), Some("Tagging"));
    assert_eq!(snapshot.progress, 85);
    assert_eq!(snapshot.current_track, 5);
    assert_eq!(snapshot.total_tracks, 8);
    assert!(!snapshot.processing);
}

#[test]
fn test_concurrent_writers_keep_record_valid() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("status.json");

    let handles: Vec<_> = (0..4u32)
        .map(|worker| {
            let status = file_status(&path);
            std::thread::spawn(move || {
                for step in 0..25u32 {
                    status
                        .update_progress("Ripping", (step * 4) as u8, Some(worker + 1), Some(4))
                        .unwrap();
                }
            })
        })
        .collect();

    let observer = FileStatusStore::new(&path);
    for _ in 0..50 {
        // Never a partial or corrupt record
        let raw = std::fs::read_to_string(&path).unwrap_or_default();
        if !raw.is_empty() {
            observer.load().unwrap();
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = observer.load().unwrap();
    assert_eq!(snapshot.progress, 96);
    assert_eq!(snapshot.total_tracks, 4);
    assert!(snapshot.processing);
}
