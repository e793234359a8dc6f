//! Journal events recorded while a disc is processed.
//!
//! Every run appends its events to its own log. The log is informational:
//! the pipeline never resumes from it, but `cdrip runs` replays it to show
//! what happened to past discs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::Category;
use super::run::Stage;

/// A single event in a run's journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub run_id: Uuid,

    /// Stage the event belongs to (if any)
    pub stage: Option<Stage>,

    /// Track the event concerns (if any)
    pub track: Option<u32>,

    /// Set on `Categorized` events
    #[serde(default)]
    pub category: Option<Category>,

    pub event_type: RunEventType,

    /// Human-readable summary
    pub summary: String,

    /// Time taken in milliseconds (for completed stages)
    pub duration_ms: Option<u64>,

    pub error: Option<String>,
}

impl RunEvent {
    /// Create a new event with the current timestamp
    pub fn new(run_id: Uuid, event_type: RunEventType, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            stage: None,
            track: None,
            category: None,
            event_type,
            summary: summary.into(),
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_track(mut self, track: u32) -> Self {
        self.track = Some(track);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Kinds of journal events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventType {
    /// A disc was inserted and processing began
    RunStarted,

    /// Metadata lookup succeeded (summary holds "Artist - Album")
    DiscIdentified,

    /// Category decided
    Categorized,

    StageStarted,

    StageCompleted,

    TrackRipped,

    TrackEncoded,

    TrackTagged,

    /// A track failed in some stage and was dropped or kept untagged
    TrackFailed,

    TransferCompleted,

    RunCompleted,

    RunFailed,

    /// The run stopped because the service was shut down
    RunAborted,
}
