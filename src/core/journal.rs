//! Append-only run journal with file-based persistence.
//!
//! Each run gets `<runs_dir>/<run_id>/events.jsonl`, one JSON event per line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{RunEvent, RunSummary};

/// Journal of a single run
pub struct RunJournal {
    run_dir: PathBuf,
    events_path: PathBuf,
}

impl RunJournal {
    /// Create or open the journal for a run
    pub async fn open(runs_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = runs_dir.join(run_id.to_string());

        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        let events_path = run_dir.join("events.jsonl");

        Ok(Self {
            run_dir,
            events_path,
        })
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Append an event to the log
    pub async fn append(&self, event: &RunEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| {
                format!("Failed to open events file: {}", self.events_path.display())
            })?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<RunEvent>> {
        replay_file(&self.events_path).await
    }

    /// Summary of this run so far
    pub async fn summary(&self) -> Result<Option<RunSummary>> {
        Ok(RunSummary::from_events(&self.replay().await?))
    }
}

async fn replay_file(events_path: &Path) -> Result<Vec<RunEvent>> {
    if !events_path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(events_path)
        .await
        .with_context(|| format!("Failed to open events file: {}", events_path.display()))?;

    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut events = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: RunEvent = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse event: {}", line))?;
        events.push(event);
    }

    Ok(events)
}

/// Summaries of all journaled runs, most recent first
pub async fn list_runs(runs_dir: &Path) -> Result<Vec<RunSummary>> {
    if !runs_dir.exists() {
        return Ok(Vec::new());
    }

    let mut summaries = Vec::new();
    let mut entries = fs::read_dir(runs_dir)
        .await
        .with_context(|| format!("Failed to read runs directory: {}", runs_dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }

        let is_run = entry
            .file_name()
            .to_str()
            .map_or(false, |name| Uuid::parse_str(name).is_ok());
        if !is_run {
            continue;
        }

        let events = replay_file(&entry.path().join("events.jsonl")).await?;
        if let Some(summary) = RunSummary::from_events(&events) {
            summaries.push(summary);
        }
    }

    summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(summaries)
}
