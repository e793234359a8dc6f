//! Run state: the in-memory record of one disc being processed and the
//! summary reconstructed from its journal.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::{Category, CategoryResult};
use super::events::{RunEvent, RunEventType};

/// Pipeline stage, as shown in the status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Identifying,
    Categorizing,
    Ripping,
    Encoding,
    Tagging,
    Syncing,
    Ejecting,
    Failed,
}

impl Stage {
    /// Label written to the status file
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Identifying => "Identifying",
            Self::Categorizing => "Categorizing",
            Self::Ripping => "Ripping",
            Self::Encoding => "Encoding",
            Self::Tagging => "Tagging",
            Self::Syncing => "Syncing",
            Self::Ejecting => "Ejecting",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happened when a track was extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Ripped(PathBuf),
    Failed(String),
}

/// A track that made it through encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTrack {
    pub number: u32,
    pub path: PathBuf,
    pub tagged: bool,
}

/// Mutable state of the run currently in progress
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub id: Uuid,
    pub stage: Stage,
    pub started_at: DateTime<Utc>,

    /// "Artist - Album" once identified
    pub album: Option<String>,
    pub category: Option<CategoryResult>,

    /// Extraction outcome per attempted track, in disc order
    pub rips: Vec<(u32, TrackOutcome)>,

    pub encoded: Vec<EncodedTrack>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Idle,
            started_at: Utc::now(),
            album: None,
            category: None,
            rips: Vec::new(),
            encoded: Vec::new(),
        }
    }

    pub fn advance(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn record_rip(&mut self, number: u32, outcome: TrackOutcome) {
        self.rips.push((number, outcome));
    }

    /// Tracks whose extraction succeeded, with their intermediate files
    pub fn ripped(&self) -> impl Iterator<Item = (u32, &Path)> + '_ {
        self.rips.iter().filter_map(|(number, outcome)| match outcome {
            TrackOutcome::Ripped(path) => Some((*number, path.as_path())),
            TrackOutcome::Failed(_) => None,
        })
    }

    pub fn failed_rips(&self) -> usize {
        self.rips
            .iter()
            .filter(|(_, o)| matches!(o, TrackOutcome::Failed(_)))
            .count()
    }

    /// Numbers of the tracks that were encoded
    pub fn processed_tracks(&self) -> Vec<u32> {
        self.encoded.iter().map(|t| t.number).collect()
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunOutcome {
    Completed,
    Failed { error: String },
    Aborted { reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed { error } => write!(f, "failed: {}", error),
            Self::Aborted { reason } => write!(f, "aborted: {}", reason),
        }
    }
}

/// What a finished run reports to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub album: Option<String>,
    pub category: Option<CategoryResult>,
    pub outcome: RunOutcome,

    /// Tracks that were extracted and encoded
    pub processed_tracks: Vec<u32>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// A past run, reconstructed by replaying its journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub album: Option<String>,
    pub category: Option<Category>,
    pub last_stage: Option<Stage>,
    pub tracks_ripped: u32,
    pub tracks_encoded: u32,
    pub tracks_failed: u32,

    /// `None` when the journal ends without a terminal event
    pub outcome: Option<RunOutcome>,
}

impl RunSummary {
    /// Reconstruct a summary from a sequence of events
    pub fn from_events(events: &[RunEvent]) -> Option<Self> {
        let first = events.first()?;

        let mut summary = Self {
            id: first.run_id,
            started_at: first.timestamp,
            completed_at: None,
            album: None,
            category: None,
            last_stage: None,
            tracks_ripped: 0,
            tracks_encoded: 0,
            tracks_failed: 0,
            outcome: None,
        };

        for event in events {
            summary.apply_event(event);
        }

        Some(summary)
    }

    /// Apply a single event to the summary
    pub fn apply_event(&mut self, event: &RunEvent) {
        if event.stage.is_some() {
            self.last_stage = event.stage;
        }

        match event.event_type {
            RunEventType::RunStarted => self.started_at = event.timestamp,
            RunEventType::DiscIdentified => self.album = Some(event.summary.clone()),
            RunEventType::Categorized => self.category = event.category,
            RunEventType::TrackRipped => self.tracks_ripped += 1,
            RunEventType::TrackEncoded => self.tracks_encoded += 1,
            RunEventType::TrackFailed => self.tracks_failed += 1,
            RunEventType::RunCompleted => {
                self.outcome = Some(RunOutcome::Completed);
                self.completed_at = Some(event.timestamp);
            }
            RunEventType::RunFailed => {
                self.outcome = Some(RunOutcome::Failed {
                    error: event.error.clone().unwrap_or_default(),
                });
                self.completed_at = Some(event.timestamp);
            }
            RunEventType::RunAborted => {
                self.outcome = Some(RunOutcome::Aborted {
                    reason: event.error.clone().unwrap_or_default(),
                });
                self.completed_at = Some(event.timestamp);
            }
            RunEventType::StageStarted
            | RunEventType::StageCompleted
            | RunEventType::TrackTagged
            | RunEventType::TransferCompleted => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}
