//! Pipeline orchestrator - drives one disc through every stage
//!
//! identify → categorize → rip → encode → tag → sync → eject
//!
//! Per-track failures are recorded and skipped; only the failures listed in
//! [`PipelineError`] end a run early. Every collaborator call is bounded by a
//! timeout, and progress is relayed from the adapters to the status store
//! while the call runs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{
    CdparanoiaDrive, CommandEncoder, CommandIdentifier, DiscDetector, Encoder, Identifier,
    LoftyTagWriter, RsyncTransfer, TagWriter, TrackExtractor, Transfer,
};
use crate::config::{ResolvedConfig, ServiceConfig, TimeoutConfig};
use crate::core::categorizer::Categorizer;
use crate::core::journal::RunJournal;
use crate::core::layout::{self, OutputLayout};
use crate::core::status::{SharedStatus, StatusError};
use crate::domain::{
    AlbumDescriptor, CategoryTable, EncodedTrack, EncodingProfile, PipelineRun, RunEvent,
    RunEventType, RunOutcome, RunReport, Stage, TrackOutcome, TrackTags,
};

const PROGRESS_BUFFER: usize = 32;

const IDENTIFY_PROGRESS: u8 = 5;
const CATEGORIZE_PROGRESS: u8 = 10;
const RIP_RANGE: (u8, u8) = (10, 50);
const ENCODE_RANGE: (u8, u8) = (50, 80);
const TAG_RANGE: (u8, u8) = (80, 90);
const SYNC_RANGE: (u8, u8) = (90, 99);
const DONE_PROGRESS: u8 = 100;

/// Reasons a run ends without success
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("disc could not be identified")]
    Unidentifiable,

    #[error("no track could be extracted")]
    NoTracksExtracted,

    #[error("no track could be encoded")]
    NoTracksEncoded,

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("setup failed: {0}")]
    Setup(String),
}

/// Process-wide running flag.
///
/// Cleared once on shutdown; stage loops stop at the next track boundary and
/// [`RunningFlag::sleep`] returns early.
#[derive(Debug, Clone)]
pub struct RunningFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_running(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn stop(&self) {
        self.tx.send_replace(false);
    }

    /// Sleep for `duration` unless stopped first. Returns whether still running.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = rx.wait_for(|running| !*running) => false,
        }
    }
}

/// External collaborators the pipeline drives
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn DiscDetector>,
    pub identifier: Arc<dyn Identifier>,
    pub extractor: Arc<dyn TrackExtractor>,
    pub encoder: Arc<dyn Encoder>,
    pub tagger: Arc<dyn TagWriter>,
    pub transfer: Arc<dyn Transfer>,
}

impl Collaborators {
    /// Command-line tool adapters for the configured drive and remote
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let drive = Arc::new(CdparanoiaDrive::new(
            config.ripper.device.clone(),
            config.ripper.quality,
        ));

        Self {
            detector: drive.clone(),
            identifier: Arc::new(CommandIdentifier::new(
                config.identify.command.clone(),
                config.identify.args.clone(),
                config.ripper.device.clone(),
                config.identify.cover_base_url.clone(),
            )),
            extractor: drive,
            encoder: Arc::new(CommandEncoder::new()),
            tagger: Arc::new(LoftyTagWriter::new()),
            transfer: Arc::new(RsyncTransfer::new(
                config.sync.host.clone(),
                config.sync.user.clone(),
                config.sync.compression,
            )),
        }
    }
}

/// Configuration the orchestrator consumes
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub local_path: PathBuf,
    pub organize_by: OutputLayout,
    pub profiles: CategoryTable<EncodingProfile>,
    pub remote_paths: CategoryTable<String>,
    pub sync_enabled: bool,
    pub cleanup: bool,
    pub auto_eject: bool,
    /// Journal directory; `None` disables the run journal
    pub runs_dir: Option<PathBuf>,
    pub timeouts: TimeoutConfig,
    pub service: ServiceConfig,
}

impl PipelineSettings {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            local_path: config.local_path.clone(),
            organize_by: config.organize_by,
            profiles: config.ripper.profiles.clone(),
            remote_paths: config.sync.remote_paths.clone(),
            sync_enabled: config.sync.enabled,
            cleanup: config.sync.cleanup,
            auto_eject: config.sync.auto_eject,
            runs_dir: Some(config.runs_dir()),
            timeouts: config.timeouts.clone(),
            service: config.service.clone(),
        }
    }
}

/// Slice of the overall 0-100 progress owned by one call
#[derive(Debug, Clone, Copy)]
struct ProgressWindow {
    stage: Stage,
    start: u8,
    end: u8,
    track: Option<u32>,
    total_tracks: Option<u32>,
}

impl ProgressWindow {
    /// Window of item `index` out of `total` within `range`
    fn item(stage: Stage, range: (u8, u8), index: usize, total: usize) -> Self {
        Self {
            stage,
            start: overall_progress(range, index, total, 0),
            end: overall_progress(range, index + 1, total, 0),
            track: None,
            total_tracks: None,
        }
    }

    fn with_tracks(mut self, track: u32, total: usize) -> Self {
        self.track = Some(track);
        self.total_tracks = u32::try_from(total).ok();
        self
    }

    fn at(&self, fraction: u8) -> u8 {
        let span = u32::from(self.end.saturating_sub(self.start));
        let offset = span * u32::from(fraction.min(100)) / 100;
        self.start.saturating_add(offset as u8)
    }
}

fn overall_progress(range: (u8, u8), index: usize, total: usize, fraction: u8) -> u8 {
    let (start, end) = (u64::from(range.0), u64::from(range.1));
    let total = total.max(1) as u64;
    let done = (index as u64 * 100 + u64::from(fraction.min(100))).min(total * 100);
    (start + end.saturating_sub(start) * done / (total * 100)) as u8
}

/// Await a collaborator call, treating an elapsed timeout as its failure
async fn bounded<T>(limit: Duration, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{} timed out after {}s", what, limit.as_secs())),
    }
}

pub struct Orchestrator {
    collaborators: Collaborators,
    categorizer: Categorizer,
    status: SharedStatus,
    settings: PipelineSettings,
    running: RunningFlag,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        categorizer: Categorizer,
        status: SharedStatus,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            collaborators,
            categorizer,
            status,
            settings,
            running: RunningFlag::new(),
        }
    }

    /// Share an existing running flag (e.g. one wired to Ctrl-C)
    pub fn with_running_flag(mut self, running: RunningFlag) -> Self {
        self.running = running;
        self
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    pub fn status(&self) -> &SharedStatus {
        &self.status
    }

    /// Process the disc currently in the drive
    pub async fn process_disc(&self) -> RunReport {
        self.execute(PipelineRun::new()).await
    }

    #[instrument(skip(self, run), fields(run_id = %run.id))]
    async fn execute(&self, mut run: PipelineRun) -> RunReport {
        info!("Starting disc run");
        let journal = self.open_journal(&run).await;
        let journal = journal.as_ref();

        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::RunStarted, "Disc run started"),
        )
        .await;

        let result = self.run_stages(&mut run, journal).await;

        let outcome = match &result {
            Ok(()) => self.complete_run(&run, journal).await,
            Err(PipelineError::Cancelled { stage }) => {
                self.handle_run_aborted(&run, journal, *stage).await
            }
            Err(e) => self.handle_run_failure(&mut run, journal, e).await,
        };

        self.publish(|status| status.set_processing(false)).await;

        RunReport {
            run_id: run.id,
            album: run.album.clone(),
            category: run.category.clone(),
            outcome,
            processed_tracks: run.processed_tracks(),
        }
    }

    async fn run_stages(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
    ) -> Result<(), PipelineError> {
        self.ensure_running(Stage::Identifying)?;

        let album = self.identify(run, journal).await?;

        let started = self.enter(run, journal, Stage::Categorizing, CATEGORIZE_PROGRESS).await;
        let category = self.categorizer.categorize_album(&album);
        info!(
            category = %category.category,
            confidence = category.confidence,
            reason = %category.reason,
            "Disc categorized"
        );
        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::Categorized, category.reason.clone())
                .with_category(category.category),
        )
        .await;
        let profile = self.settings.profiles.get(category.category).clone();
        let remote_root = self.settings.remote_paths.get(category.category).clone();
        run.category = Some(category);
        self.finish(run, journal, Stage::Categorizing, started).await;

        let album_dir = layout::album_dir(
            &self.settings.local_path,
            self.settings.organize_by,
            &album.artist,
            &album.title,
        );
        tokio::fs::create_dir_all(&album_dir).await.map_err(|e| {
            PipelineError::Setup(format!("cannot create {}: {}", album_dir.display(), e))
        })?;
        debug!(dir = %album_dir.display(), %profile, "Album directory ready");

        self.rip(run, journal, &album, &album_dir).await?;
        self.encode(run, journal, &album, &album_dir, &profile).await?;
        self.tag(run, journal, &album).await?;

        if self.settings.sync_enabled {
            self.ensure_running(Stage::Syncing)?;
            self.sync(run, journal, &album_dir, &remote_root).await?;
        } else {
            info!("Sync disabled, keeping files locally");
        }

        if self.settings.auto_eject {
            self.eject(run, journal).await;
        }

        Ok(())
    }

    async fn identify(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
    ) -> Result<AlbumDescriptor, PipelineError> {
        let started = self.enter(run, journal, Stage::Identifying, IDENTIFY_PROGRESS).await;
        let limit = self.settings.timeouts.identify();

        let mut album = match bounded(limit, "identification", self.collaborators.identifier.identify()).await {
            Ok(Some(album)) => album,
            Ok(None) => {
                warn!("No metadata match for disc");
                return Err(PipelineError::Unidentifiable);
            }
            Err(e) => {
                error!(error = %e, "Identification failed");
                return Err(PipelineError::Unidentifiable);
            }
        };

        if let Some(release_id) = album.release_id.clone() {
            match bounded(limit, "cover download", self.collaborators.identifier.download_cover(&release_id)).await {
                Ok(cover) => album.cover = cover,
                Err(e) => warn!(error = %e, "Cover download failed"),
            }
        }

        let cover_path = match album.cover.clone() {
            Some(bytes) => self
                .publish(move |status| status.publish_cover(&bytes))
                .await
                .flatten(),
            None => None,
        };
        let (title, artist) = (album.title.clone(), album.artist.clone());
        self.publish(move |status| status.update_cd(&title, &artist, cover_path.as_deref()))
            .await;

        let name = album.display_name();
        info!(album = %name, tracks = album.tracks.len(), "Disc identified");
        run.album = Some(name.clone());
        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::DiscIdentified, name),
        )
        .await;
        self.finish(run, journal, Stage::Identifying, started).await;

        Ok(album)
    }

    async fn rip(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
        album: &AlbumDescriptor,
        album_dir: &Path,
    ) -> Result<(), PipelineError> {
        let started = self.enter(run, journal, Stage::Ripping, RIP_RANGE.0).await;
        let tracks = album.ordered_tracks();
        let total = tracks.len();

        for (index, track) in tracks.iter().enumerate() {
            self.ensure_running(Stage::Ripping)?;

            let window = ProgressWindow::item(Stage::Ripping, RIP_RANGE, index, total)
                .with_tracks(track.number, total);
            self.publish_window(&window, 0).await;

            let dest = layout::wav_path(album_dir, track.number);
            let result = self
                .with_progress(window, self.settings.timeouts.extract(), "extraction", |tx| {
                    self.collaborators.extractor.extract_track(track.number, &dest, tx)
                })
                .await;

            match result {
                Ok(()) => {
                    info!(track = track.number, "Track ripped");
                    self.record(
                        journal,
                        RunEvent::new(run.id, RunEventType::TrackRipped, format!("Ripped track {}", track.number))
                            .with_stage(Stage::Ripping)
                            .with_track(track.number),
                    )
                    .await;
                    run.record_rip(track.number, TrackOutcome::Ripped(dest));
                }
                Err(e) => {
                    error!(track = track.number, error = %e, "Track extraction failed");
                    self.record_track_failure(run, journal, Stage::Ripping, track.number, &e).await;
                    run.record_rip(track.number, TrackOutcome::Failed(e.to_string()));
                }
            }
        }

        if run.ripped().next().is_none() {
            return Err(PipelineError::NoTracksExtracted);
        }

        self.finish(run, journal, Stage::Ripping, started).await;
        Ok(())
    }

    async fn encode(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
        album: &AlbumDescriptor,
        album_dir: &Path,
        profile: &EncodingProfile,
    ) -> Result<(), PipelineError> {
        let started = self.enter(run, journal, Stage::Encoding, ENCODE_RANGE.0).await;
        let ripped: Vec<(u32, PathBuf)> = run
            .ripped()
            .map(|(number, path)| (number, path.to_path_buf()))
            .collect();
        let total = ripped.len();

        for (index, (number, wav)) in ripped.iter().enumerate() {
            self.ensure_running(Stage::Encoding)?;

            let window = ProgressWindow::item(Stage::Encoding, ENCODE_RANGE, index, total)
                .with_tracks(*number, total);
            self.publish_window(&window, 0).await;

            let title = track_title(album, *number);
            let dest = layout::track_path(album_dir, *number, &title, profile);
            let limit = self.settings.timeouts.encode();

            match bounded(limit, "encoding", self.collaborators.encoder.encode(wav, &dest, profile)).await {
                Ok(()) => {
                    info!(track = number, file = %dest.display(), "Track encoded");
                    if let Err(e) = tokio::fs::remove_file(wav).await {
                        warn!(track = number, error = %e, "Failed to remove intermediate file");
                    }
                    self.record(
                        journal,
                        RunEvent::new(run.id, RunEventType::TrackEncoded, format!("Encoded track {}", number))
                            .with_stage(Stage::Encoding)
                            .with_track(*number),
                    )
                    .await;
                    run.encoded.push(EncodedTrack {
                        number: *number,
                        path: dest,
                        tagged: false,
                    });
                }
                Err(e) => {
                    error!(track = number, error = %e, "Track encoding failed");
                    self.record_track_failure(run, journal, Stage::Encoding, *number, &e).await;
                }
            }
        }

        if run.encoded.is_empty() {
            return Err(PipelineError::NoTracksEncoded);
        }

        self.finish(run, journal, Stage::Encoding, started).await;
        Ok(())
    }

    async fn tag(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
        album: &AlbumDescriptor,
    ) -> Result<(), PipelineError> {
        let started = self.enter(run, journal, Stage::Tagging, TAG_RANGE.0).await;
        let total = run.encoded.len();

        for index in 0..total {
            self.ensure_running(Stage::Tagging)?;

            let (number, path) = {
                let encoded = &run.encoded[index];
                (encoded.number, encoded.path.clone())
            };
            let window = ProgressWindow::item(Stage::Tagging, TAG_RANGE, index, total)
                .with_tracks(number, total);
            self.publish_window(&window, 0).await;

            let tags = match album.tracks.iter().find(|t| t.number == number) {
                Some(track) => TrackTags::for_track(album, track),
                None => continue,
            };
            let limit = self.settings.timeouts.tag();

            match bounded(limit, "tagging", self.collaborators.tagger.write_tags(&path, &tags, album.cover.as_deref())).await {
                Ok(()) => {
                    debug!(track = number, "Track tagged");
                    run.encoded[index].tagged = true;
                    self.record(
                        journal,
                        RunEvent::new(run.id, RunEventType::TrackTagged, format!("Tagged track {}", number))
                            .with_stage(Stage::Tagging)
                            .with_track(number),
                    )
                    .await;
                }
                Err(e) => {
                    warn!(track = number, error = %e, "Tag write failed, keeping untagged file");
                    self.record_track_failure(run, journal, Stage::Tagging, number, &e).await;
                }
            }
        }

        self.finish(run, journal, Stage::Tagging, started).await;
        Ok(())
    }

    async fn sync(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
        album_dir: &Path,
        remote_root: &str,
    ) -> Result<(), PipelineError> {
        let started = self.enter(run, journal, Stage::Syncing, SYNC_RANGE.0).await;
        let relative = layout::relative_parent(&self.settings.local_path, album_dir);
        let remote = layout::remote_dir(remote_root, &relative);
        info!(local = %album_dir.display(), %remote, "Transferring album");

        let window = ProgressWindow::item(Stage::Syncing, SYNC_RANGE, 0, 1);
        let limit = self.settings.timeouts.transfer();
        self.with_progress(window, limit, "transfer", |tx| {
            self.collaborators.transfer.sync(album_dir, &remote, tx)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Transfer failed");
            PipelineError::TransferFailed(e.to_string())
        })?;

        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::TransferCompleted, remote.clone())
                .with_stage(Stage::Syncing),
        )
        .await;

        if self.settings.cleanup {
            match bounded(limit, "cleanup", self.collaborators.transfer.cleanup_local(album_dir)).await {
                Ok(()) => debug!(dir = %album_dir.display(), "Local files removed"),
                Err(e) => warn!(error = %e, "Local cleanup failed"),
            }
        }

        self.finish(run, journal, Stage::Syncing, started).await;
        Ok(())
    }

    async fn eject(&self, run: &mut PipelineRun, journal: Option<&RunJournal>) {
        let started = self.enter(run, journal, Stage::Ejecting, SYNC_RANGE.1).await;
        let limit = self.settings.timeouts.eject();

        match bounded(limit, "eject", self.collaborators.detector.eject()).await {
            Ok(()) => info!("Disc ejected"),
            Err(e) => warn!(error = %e, "Eject failed"),
        }

        self.finish(run, journal, Stage::Ejecting, started).await;
    }

    /// Run a collaborator call while relaying its progress into `window`
    async fn with_progress<F>(
        &self,
        window: ProgressWindow,
        limit: Duration,
        what: &str,
        call: impl FnOnce(mpsc::Sender<u8>) -> F,
    ) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let (tx, mut rx) = mpsc::channel(PROGRESS_BUFFER);
        let work = bounded(limit, what, call(tx));

        let relay = async {
            let mut last = None;
            while let Some(fraction) = rx.recv().await {
                let overall = window.at(fraction);
                if last != Some(overall) {
                    self.publish_window(&window, fraction).await;
                    last = Some(overall);
                }
            }
        };

        let (result, ()) = tokio::join!(work, relay);
        result
    }

    fn ensure_running(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.running.is_running() {
            Ok(())
        } else {
            Err(PipelineError::Cancelled { stage })
        }
    }

    async fn enter(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
        stage: Stage,
        percent: u8,
    ) -> Instant {
        run.advance(stage);
        info!(stage = %stage, "Stage started");
        self.publish(move |status| status.update_progress(stage.label(), percent, None, None))
            .await;
        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::StageStarted, format!("{} started", stage))
                .with_stage(stage),
        )
        .await;
        Instant::now()
    }

    async fn finish(
        &self,
        run: &PipelineRun,
        journal: Option<&RunJournal>,
        stage: Stage,
        started: Instant,
    ) {
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(stage = %stage, duration_ms, "Stage completed");
        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::StageCompleted, format!("{} completed", stage))
                .with_stage(stage)
                .with_duration(duration_ms),
        )
        .await;
    }

    async fn record_track_failure(
        &self,
        run: &PipelineRun,
        journal: Option<&RunJournal>,
        stage: Stage,
        number: u32,
        error: &anyhow::Error,
    ) {
        self.record(
            journal,
            RunEvent::new(
                run.id,
                RunEventType::TrackFailed,
                format!("{} failed for track {}", stage, number),
            )
            .with_stage(stage)
            .with_track(number)
            .with_error(error.to_string()),
        )
        .await;
    }

    async fn complete_run(&self, run: &PipelineRun, journal: Option<&RunJournal>) -> RunOutcome {
        info!(tracks = run.encoded.len(), "Run completed successfully");
        self.publish(|status| status.update_progress(Stage::Idle.label(), DONE_PROGRESS, None, None))
            .await;
        self.record(
            journal,
            RunEvent::new(
                run.id,
                RunEventType::RunCompleted,
                format!("{} tracks processed", run.encoded.len()),
            ),
        )
        .await;
        RunOutcome::Completed
    }

    async fn handle_run_aborted(
        &self,
        run: &PipelineRun,
        journal: Option<&RunJournal>,
        stage: Stage,
    ) -> RunOutcome {
        let reason = format!("stopped during {}", stage);
        warn!(stage = %stage, "Run aborted");
        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::RunAborted, "Run aborted")
                .with_stage(stage)
                .with_error(reason.clone()),
        )
        .await;
        RunOutcome::Aborted { reason }
    }

    async fn handle_run_failure(
        &self,
        run: &mut PipelineRun,
        journal: Option<&RunJournal>,
        error: &PipelineError,
    ) -> RunOutcome {
        let failed_at = run.stage;
        error!(stage = %failed_at, error = %error, "Run failed");
        run.advance(Stage::Failed);

        let progress = self
            .publish(|status| Ok(status.get_status().progress))
            .await
            .unwrap_or(0);
        self.publish(move |status| status.update_progress(Stage::Failed.label(), progress, None, None))
            .await;
        self.record(
            journal,
            RunEvent::new(run.id, RunEventType::RunFailed, format!("Failed during {}", failed_at))
                .with_stage(failed_at)
                .with_error(error.to_string()),
        )
        .await;
        RunOutcome::Failed {
            error: error.to_string(),
        }
    }

    async fn open_journal(&self, run: &PipelineRun) -> Option<RunJournal> {
        let runs_dir = self.settings.runs_dir.as_ref()?;
        match RunJournal::open(runs_dir, run.id).await {
            Ok(journal) => Some(journal),
            Err(e) => {
                warn!(error = %e, "Run journal unavailable");
                None
            }
        }
    }

    async fn record(&self, journal: Option<&RunJournal>, event: RunEvent) {
        if let Some(journal) = journal {
            if let Err(e) = journal.append(&event).await {
                warn!(error = %e, "Failed to append run event");
            }
        }
    }

    async fn publish_window(&self, window: &ProgressWindow, fraction: u8) {
        let window = *window;
        self.publish(move |status| {
            status.update_progress(
                window.stage.label(),
                window.at(fraction),
                window.track,
                window.total_tracks,
            )
        })
        .await;
    }

    /// Status access is telemetry; failures are logged and read as `None`.
    ///
    /// The file store blocks on advisory locks held by observers, so every
    /// access runs on the blocking pool.
    async fn publish<T, F>(&self, access: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&SharedStatus) -> Result<T, StatusError> + Send + 'static,
    {
        let status = self.status.clone();
        match tokio::task::spawn_blocking(move || access(&status)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to publish status");
                None
            }
            Err(e) => {
                warn!(error = %e, "Status task failed");
                None
            }
        }
    }

    /// Probe the drive: (medium present, audio disc present)
    async fn poll_drive(&self) -> Result<(bool, bool)> {
        let limit = self.settings.timeouts.probe();
        let detector = &self.collaborators.detector;

        if bounded(limit, "audio disc probe", detector.is_audio_disc()).await? {
            return Ok((true, true));
        }
        let present = bounded(limit, "disc probe", detector.is_present()).await?;
        Ok((present, false))
    }

    /// Run one disc in its own task so a panic cannot take the service down
    async fn run_contained(self: &Arc<Self>) -> bool {
        let this = Arc::clone(self);
        match tokio::spawn(async move { this.process_disc().await }).await {
            Ok(report) => {
                info!(outcome = %report.outcome, "Disc run finished");
                report.is_success()
            }
            Err(e) => {
                if e.is_panic() {
                    error!("Disc run panicked");
                } else {
                    error!(error = %e, "Disc run task failed");
                }
                self.publish(|status| status.set_processing(false)).await;
                false
            }
        }
    }

    /// Detection loop: process each newly inserted audio disc once.
    ///
    /// Returns when the running flag is cleared.
    pub async fn run_service(self: Arc<Self>) -> Result<()> {
        let service = self.settings.service.clone();
        let mut disc_loaded = false;
        info!(
            poll_secs = service.poll_interval_secs,
            "Waiting for discs"
        );

        while self.running.is_running() {
            match self.poll_drive().await {
                Ok((_, true)) if !disc_loaded => {
                    info!("Audio disc inserted");
                    disc_loaded = true;

                    if !self.run_contained().await {
                        warn!(
                            backoff_secs = service.failure_backoff_secs,
                            "Run did not succeed, backing off"
                        );
                        if !self.running.sleep(service.failure_backoff()).await {
                            break;
                        }
                    }
                }
                Ok((false, _)) if disc_loaded => {
                    info!("Disc removed");
                    disc_loaded = false;
                    self.publish(|status| status.clear()).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Disc detection failed");
                    if !self.running.sleep(service.error_backoff()).await {
                        break;
                    }
                    continue;
                }
            }

            if !self.running.sleep(service.poll_interval()).await {
                break;
            }
        }

        info!("Service stopped");
        Ok(())
    }
}

fn track_title(album: &AlbumDescriptor, number: u32) -> String {
    album
        .tracks
        .iter()
        .find(|t| t.number == number)
        .map(|t| t.title.clone())
        .unwrap_or_else(|| format!("Track {}", number))
}
