//! Recording fakes for the pipeline collaborators.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use cdrip::adapters::{DiscDetector, Encoder, Identifier, TagWriter, TrackExtractor, Transfer};
use cdrip::config::{ServiceConfig, TimeoutConfig};
use cdrip::core::{
    Categorizer, Collaborators, KeywordSets, MemoryStatusStore, Orchestrator, OutputLayout,
    PipelineSettings, RunningFlag, SharedStatus, StatusError, StatusSnapshot, StatusStore,
};
use cdrip::domain::{
    AlbumDescriptor, Category, CategoryTable, EncodingProfile, TrackDescriptor, TrackTags,
};

pub fn album(artist: &str, title: &str, genre: Option<&str>, tracks: usize) -> AlbumDescriptor {
    AlbumDescriptor {
        artist: artist.to_string(),
        title: title.to_string(),
        year: Some(2001),
        genre: genre.map(str::to_string),
        tracks: (1..=tracks as u32)
            .map(|n| TrackDescriptor::new(n, format!("Song {}", n), 180))
            .collect(),
        release_id: None,
        cover: None,
    }
}

#[derive(Default)]
pub struct FakeDrive {
    pub failing_tracks: HashSet<u32>,
    pub audio: AtomicBool,
    pub present: AtomicBool,
    pub extracted: Mutex<Vec<u32>>,
    pub ejects: AtomicUsize,
    pub fail_eject: bool,
    /// Make every audio check fail
    pub fail_detection: AtomicBool,
    pub detections: AtomicUsize,
    /// Clear this flag once the given track has been extracted
    pub stop_after: Option<(u32, RunningFlag)>,
}

#[async_trait]
impl DiscDetector for FakeDrive {
    async fn is_present(&self) -> Result<bool> {
        Ok(self.present.load(Ordering::SeqCst))
    }

    async fn is_audio_disc(&self) -> Result<bool> {
        self.detections.fetch_add(1, Ordering::SeqCst);
        if self.fail_detection.load(Ordering::SeqCst) {
            anyhow::bail!("no medium found");
        }
        Ok(self.audio.load(Ordering::SeqCst))
    }

    async fn eject(&self) -> Result<()> {
        self.ejects.fetch_add(1, Ordering::SeqCst);
        if self.fail_eject {
            anyhow::bail!("tray stuck");
        }
        Ok(())
    }
}

#[async_trait]
impl TrackExtractor for FakeDrive {
    async fn extract_track(&self, number: u32, dest: &Path, progress: mpsc::Sender<u8>) -> Result<()> {
        self.extracted.lock().unwrap().push(number);
        let _ = progress.try_send(50);

        if let Some((track, flag)) = &self.stop_after {
            if *track == number {
                flag.stop();
            }
        }

        if self.failing_tracks.contains(&number) {
            anyhow::bail!("read error on track {}", number);
        }

        tokio::fs::write(dest, b"RIFF....WAVE").await?;
        let _ = progress.try_send(100);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIdentifier {
    pub album: Option<AlbumDescriptor>,
    pub cover: Option<Vec<u8>>,
    pub cover_requests: Mutex<Vec<String>>,
}

#[async_trait]
impl Identifier for FakeIdentifier {
    async fn identify(&self) -> Result<Option<AlbumDescriptor>> {
        Ok(self.album.clone())
    }

    async fn download_cover(&self, release_id: &str) -> Result<Option<Vec<u8>>> {
        self.cover_requests
            .lock()
            .unwrap()
            .push(release_id.to_string());
        Ok(self.cover.clone())
    }
}

#[derive(Default)]
pub struct FakeEncoder {
    /// Intermediate file names that fail to encode, e.g. "track02.wav"
    pub failing_sources: HashSet<String>,
    pub calls: Mutex<Vec<(PathBuf, PathBuf, EncodingProfile)>>,
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, src: &Path, dest: &Path, profile: &EncodingProfile) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dest.to_path_buf(), profile.clone()));

        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing_sources.contains(&name) {
            anyhow::bail!("encoder crashed on {}", name);
        }

        tokio::fs::write(dest, b"encoded").await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTagger {
    pub fail: bool,
    pub calls: Mutex<Vec<(PathBuf, TrackTags, bool)>>,
}

#[async_trait]
impl TagWriter for FakeTagger {
    async fn write_tags(&self, path: &Path, tags: &TrackTags, cover: Option<&[u8]>) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone(), cover.is_some()));
        if self.fail {
            anyhow::bail!("unsupported tag format");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTransfer {
    pub fail: bool,
    pub fail_cleanup: bool,
    pub syncs: Mutex<Vec<(PathBuf, String)>>,
    pub cleanups: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn sync(&self, local_dir: &Path, remote_dir: &str, progress: mpsc::Sender<u8>) -> Result<()> {
        self.syncs
            .lock()
            .unwrap()
            .push((local_dir.to_path_buf(), remote_dir.to_string()));
        let _ = progress.try_send(40);
        if self.fail {
            anyhow::bail!("connection refused");
        }
        let _ = progress.try_send(100);
        Ok(())
    }

    async fn cleanup_local(&self, local_dir: &Path) -> Result<()> {
        self.cleanups.lock().unwrap().push(local_dir.to_path_buf());
        if self.fail_cleanup {
            anyhow::bail!("permission denied");
        }
        tokio::fs::remove_dir_all(local_dir).await?;
        Ok(())
    }
}

/// Memory store that keeps every snapshot written through it
#[derive(Default)]
pub struct RecordingStatusStore {
    inner: MemoryStatusStore,
    pub history: Mutex<Vec<StatusSnapshot>>,
}

impl RecordingStatusStore {
    /// (step, progress, current track, total tracks) per write
    pub fn steps(&self) -> Vec<(String, u8, u32, u32)> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .map(|s| {
                (
                    s.current_step.clone().unwrap_or_default(),
                    s.progress,
                    s.current_track,
                    s.total_tracks,
                )
            })
            .collect()
    }
}

impl StatusStore for RecordingStatusStore {
    fn load(&self) -> Result<StatusSnapshot, StatusError> {
        self.inner.load()
    }

    fn store(&self, snapshot: &StatusSnapshot) -> Result<(), StatusError> {
        self.history.lock().unwrap().push(snapshot.clone());
        self.inner.store(snapshot)
    }

    fn modify(
        &self,
        mutate: &mut dyn FnMut(&mut StatusSnapshot),
    ) -> Result<StatusSnapshot, StatusError> {
        let snapshot = self.inner.modify(mutate)?;
        self.history.lock().unwrap().push(snapshot.clone());
        Ok(snapshot)
    }
}

/// A configured set of fakes plus the settings for one test run
pub struct Harness {
    pub drive: Arc<FakeDrive>,
    pub identifier: Arc<FakeIdentifier>,
    pub encoder: Arc<FakeEncoder>,
    pub tagger: Arc<FakeTagger>,
    pub transfer: Arc<FakeTransfer>,
    pub store: Arc<MemoryStatusStore>,
    pub settings: PipelineSettings,
}

impl Harness {
    pub fn new(root: &Path, album: Option<AlbumDescriptor>) -> Self {
        Self {
            drive: Arc::new(FakeDrive::default()),
            identifier: Arc::new(FakeIdentifier {
                album,
                ..FakeIdentifier::default()
            }),
            encoder: Arc::new(FakeEncoder::default()),
            tagger: Arc::new(FakeTagger::default()),
            transfer: Arc::new(FakeTransfer::default()),
            store: Arc::new(MemoryStatusStore::new()),
            settings: settings(root),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            detector: self.drive.clone(),
            identifier: self.identifier.clone(),
            extractor: self.drive.clone(),
            encoder: self.encoder.clone(),
            tagger: self.tagger.clone(),
            transfer: self.transfer.clone(),
        }
    }

    pub fn status(&self) -> SharedStatus {
        SharedStatus::new(self.store.clone())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with_status(self.status())
    }

    /// Same fakes, different status backend
    pub fn orchestrator_with_status(&self, status: SharedStatus) -> Orchestrator {
        Orchestrator::new(
            self.collaborators(),
            Categorizer::new(KeywordSets::default()),
            status,
            self.settings.clone(),
        )
    }
}

pub fn settings(root: &Path) -> PipelineSettings {
    let mp3 = EncodingProfile::Mp3 { bitrate: 320 };

    PipelineSettings {
        local_path: root.join("rips"),
        organize_by: OutputLayout::default(),
        profiles: CategoryTable::new(EncodingProfile::Flac { compression: 8 })
            .with(Category::Children, mp3.clone())
            .with(Category::Audiobook, mp3),
        remote_paths: CategoryTable::new("audio/music".to_string())
            .with(Category::Children, "audio/children".to_string())
            .with(Category::Audiobook, "audio/audiobooks".to_string()),
        sync_enabled: true,
        cleanup: true,
        auto_eject: true,
        runs_dir: Some(root.join("runs")),
        timeouts: TimeoutConfig::default(),
        service: ServiceConfig::default(),
    }
}
