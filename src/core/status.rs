//! Shared status record published for out-of-process observers.
//!
//! The orchestrator writes a small JSON snapshot describing the disc being
//! processed and its progress; observers (the `status` command, a web page,
//! a display) only read it. The file is guarded by advisory locks: readers
//! take a shared lock, writers hold an exclusive lock across the whole
//! read-mutate-write cycle so readers never see a partial record.
//!
//! The record is telemetry. Separate calls are not atomic with respect to
//! each other, so observers must tolerate staleness and interleavings.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// URL observers use to fetch the published cover
pub const COVER_URL: &str = "/api/cover";

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock status file {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize status: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The disc currently in the drive, as observers see it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentCd {
    pub name: String,
    pub artist: String,
    pub cover_path: Option<PathBuf>,
    pub cover_url: Option<String>,
}

/// Externally visible projection of the run in progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    pub current_cd: Option<CurrentCd>,
    pub processing: bool,
    pub current_step: Option<String>,

    /// 0..=100
    pub progress: u8,
    pub current_track: u32,
    pub total_tracks: u32,
    pub last_update: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Time since the last write, if the record was ever written
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_update.map(|ts| now - ts)
    }

    /// True when every field except `last_update` holds its default
    pub fn is_cleared(&self) -> bool {
        let mut other = self.clone();
        other.last_update = None;
        other == Self::default()
    }
}

/// Load/store pair behind which the status record lives.
///
/// `modify` must apply its mutation to the latest record; the default
/// load-then-store is only atomic for stores without concurrent writers.
pub trait StatusStore: Send + Sync {
    fn load(&self) -> Result<StatusSnapshot, StatusError>;

    fn store(&self, snapshot: &StatusSnapshot) -> Result<(), StatusError>;

    fn modify(
        &self,
        mutate: &mut dyn FnMut(&mut StatusSnapshot),
    ) -> Result<StatusSnapshot, StatusError> {
        let mut snapshot = self.load()?;
        mutate(&mut snapshot);
        self.store(&snapshot)?;
        Ok(snapshot)
    }
}

/// JSON file guarded by fs2 advisory locks
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StatusError {
        StatusError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn lock_error(&self, source: std::io::Error) -> StatusError {
        StatusError::Lock {
            path: self.path.clone(),
            source,
        }
    }

    /// Open for read+write without truncating, creating parents as needed
    fn open_for_write(&self) -> Result<File, StatusError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_error(e))
    }

    fn read_locked(&self, mut file: &File) -> Result<StatusSnapshot, StatusError> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| self.io_error(e))?;

        if contents.trim().is_empty() {
            return Ok(StatusSnapshot::default());
        }

        match serde_json::from_str(&contents) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unreadable status file, starting from an empty record"
                );
                Ok(StatusSnapshot::default())
            }
        }
    }

    fn write_locked(&self, mut file: &File, snapshot: &StatusSnapshot) -> Result<(), StatusError> {
        let json = serde_json::to_vec_pretty(snapshot)?;

        file.set_len(0).map_err(|e| self.io_error(e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| self.io_error(e))?;
        file.write_all(&json).map_err(|e| self.io_error(e))?;
        file.flush().map_err(|e| self.io_error(e))?;

        Ok(())
    }
}

impl StatusStore for FileStatusStore {
    fn load(&self) -> Result<StatusSnapshot, StatusError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StatusSnapshot::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        file.lock_shared().map_err(|e| self.lock_error(e))?;

        // Lock is released when file is dropped
        self.read_locked(&file)
    }

    fn store(&self, snapshot: &StatusSnapshot) -> Result<(), StatusError> {
        let file = self.open_for_write()?;
        file.lock_exclusive().map_err(|e| self.lock_error(e))?;
        self.write_locked(&file, snapshot)
    }

    fn modify(
        &self,
        mutate: &mut dyn FnMut(&mut StatusSnapshot),
    ) -> Result<StatusSnapshot, StatusError> {
        let file = self.open_for_write()?;
        file.lock_exclusive().map_err(|e| self.lock_error(e))?;

        let mut snapshot = self.read_locked(&file)?;
        mutate(&mut snapshot);
        self.write_locked(&file, &snapshot)?;

        Ok(snapshot)
    }
}

/// In-process store, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    snapshot: Mutex<StatusSnapshot>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&self) -> Result<StatusSnapshot, StatusError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn store(&self, snapshot: &StatusSnapshot) -> Result<(), StatusError> {
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
        Ok(())
    }

    fn modify(
        &self,
        mutate: &mut dyn FnMut(&mut StatusSnapshot),
    ) -> Result<StatusSnapshot, StatusError> {
        let mut guard = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        mutate(&mut *guard);
        Ok(guard.clone())
    }
}

/// Status operations used by the orchestrator and the CLI.
///
/// Every write stamps `last_update`.
#[derive(Clone)]
pub struct SharedStatus {
    store: Arc<dyn StatusStore>,
    cover_file: Option<PathBuf>,
}

impl SharedStatus {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self {
            store,
            cover_file: None,
        }
    }

    /// Where published cover art is written
    pub fn with_cover_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cover_file = Some(path.into());
        self
    }

    pub fn update_cd(
        &self,
        name: &str,
        artist: &str,
        cover_path: Option<&Path>,
    ) -> Result<(), StatusError> {
        let cd = CurrentCd {
            name: name.to_string(),
            artist: artist.to_string(),
            cover_path: cover_path.map(Path::to_path_buf),
            cover_url: cover_path.map(|_| COVER_URL.to_string()),
        };

        self.store.modify(&mut |s: &mut StatusSnapshot| {
            s.current_cd = Some(cd.clone());
            s.last_update = Some(Utc::now());
        })?;
        Ok(())
    }

    /// Publish the current stage and progress; marks the record as processing.
    ///
    /// Omitted track counters are reset to 0.
    pub fn update_progress(
        &self,
        stage: &str,
        percent: u8,
        current_track: Option<u32>,
        total_tracks: Option<u32>,
    ) -> Result<(), StatusError> {
        self.store.modify(&mut |s: &mut StatusSnapshot| {
            s.processing = true;
            s.current_step = Some(stage.to_string());
            s.progress = percent.min(100);
            s.current_track = current_track.unwrap_or(0);
            s.total_tracks = total_tracks.unwrap_or(0);
            s.last_update = Some(Utc::now());
        })?;
        Ok(())
    }

    pub fn set_processing(&self, processing: bool) -> Result<(), StatusError> {
        self.store.modify(&mut |s: &mut StatusSnapshot| {
            s.processing = processing;
            s.last_update = Some(Utc::now());
        })?;
        Ok(())
    }

    /// Current snapshot; an unreadable store reads as the empty record
    pub fn get_status(&self) -> StatusSnapshot {
        match self.store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to read status");
                StatusSnapshot::default()
            }
        }
    }

    /// Reset every field (disc removed or manually ejected)
    pub fn clear(&self) -> Result<(), StatusError> {
        self.store.modify(&mut |s: &mut StatusSnapshot| {
            *s = StatusSnapshot {
                last_update: Some(Utc::now()),
                ..StatusSnapshot::default()
            };
        })?;
        Ok(())
    }

    /// Write cover bytes to the configured cover file, returning its path
    pub fn publish_cover(&self, bytes: &[u8]) -> Result<Option<PathBuf>, StatusError> {
        let Some(path) = &self.cover_file else {
            return Ok(None);
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StatusError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        fs::write(path, bytes).map_err(|source| StatusError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(Some(path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_status(dir: &TempDir) -> SharedStatus {
        let store = FileStatusStore::new(dir.path().join("status.json"));
        SharedStatus::new(Arc::new(store)).with_cover_file(dir.path().join("cover.jpg"))
    }

    #[test]
    fn test_missing_file_reads_as_default() {
        let dir = TempDir::new().unwrap();
        let status = file_status(&dir);

        assert_eq!(status.get_status(), StatusSnapshot::default());
    }

    #[test]
    fn test_corrupt_file_reads_as_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("status.json"), "{not json").unwrap();
        let status = file_status(&dir);

        assert_eq!(status.get_status(), StatusSnapshot::default());

        // The next write replaces the garbage
        status.set_processing(true).unwrap();
        assert!(status.get_status().processing);
    }

    #[test]
    fn test_update_cd_with_cover() {
        let dir = TempDir::new().unwrap();
        let status = file_status(&dir);

        let cover = status.publish_cover(b"jpeg").unwrap().unwrap();
        status
            .update_cd("Album", "Artist", Some(cover.as_path()))
            .unwrap();

        let snapshot = status.get_status();
        let cd = snapshot.current_cd.unwrap();
        assert_eq!(cd.name, "Album");
        assert_eq!(cd.cover_path, Some(cover.clone()));
        assert_eq!(cd.cover_url.as_deref(), Some(COVER_URL));
        assert_eq!(std::fs::read(cover).unwrap(), b"jpeg");
        assert!(snapshot.last_update.is_some());
    }

    #[test]
    fn test_shorter_write_leaves_no_trailing_bytes() {
        let dir = TempDir::new().unwrap();
        let status = file_status(&dir);

        status
            .update_cd(&"x".repeat(200), "Artist", None)
            .unwrap();
        status.clear().unwrap();

        let raw = std::fs::read_to_string(dir.path().join("status.json")).unwrap();
        let parsed: StatusSnapshot = serde_json::from_str(&raw).unwrap();
        assert!(parsed.is_cleared());
    }

    #[test]
    fn test_progress_is_capped() {
        let status = SharedStatus::new(Arc::new(MemoryStatusStore::new()));
        status.update_progress("Ripping", 140, None, None).unwrap();

        assert_eq!(status.get_status().progress, 100);
    }

    #[test]
    fn test_omitted_track_counters_reset() {
        let status = SharedStatus::new(Arc::new(MemoryStatusStore::new()));
        status.update_progress("Ripping", 40, Some(3), Some(3)).unwrap();
        status.update_progress("Syncing", 90, None, None).unwrap();

        let snapshot = status.get_status();
        assert_eq!(snapshot.current_step.as_deref(), Some("Syncing"));
        assert_eq!((snapshot.current_track, snapshot.total_tracks), (0, 0));
    }
}
