//! Command-line interface for cdrip.
//!
//! Runs the detection service, processes a single disc, and gives an
//! observer view of the shared status record and the run journal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::ResolvedConfig;
use crate::core::journal;
use crate::core::status::{FileStatusStore, SharedStatus};
use crate::core::{Categorizer, Collaborators, Orchestrator, PipelineSettings, RunningFlag};
use crate::domain::{RunOutcome, TrackDescriptor};

/// cdrip - Audio CD ripping service
#[derive(Parser, Debug)]
#[command(name = "cdrip")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (overrides CDRIP_CONFIG and discovery)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the drive and process every inserted audio disc
    Serve,

    /// Process the disc currently in the drive and exit
    Once,

    /// Show the shared status record
    Status {
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset the shared status record
    Clear,

    /// Eject the disc and reset the status record
    Eject,

    /// Categorize an album without touching the drive
    Categorize {
        artist: String,

        album: String,

        #[arg(short, long)]
        genre: Option<String>,

        #[arg(short, long)]
        year: Option<i32>,

        /// Track title (repeatable, in disc order)
        #[arg(short, long = "track")]
        tracks: Vec<String>,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self, config: ResolvedConfig) -> Result<()> {
        match self.command {
            Commands::Serve => serve(&config).await,
            Commands::Once => process_once(&config).await,
            Commands::Status { json } => show_status(&config, json),
            Commands::Clear => clear_status(&config),
            Commands::Eject => eject(&config).await,
            Commands::Categorize {
                artist,
                album,
                genre,
                year,
                tracks,
            } => categorize(&config, &artist, &album, genre.as_deref(), year, tracks),
            Commands::Runs { limit } => list_runs(&config, limit).await,
            Commands::Config => show_config(&config),
        }
    }
}

fn shared_status(config: &ResolvedConfig) -> SharedStatus {
    SharedStatus::new(Arc::new(FileStatusStore::new(config.status_file.clone())))
        .with_cover_file(config.cover_file.clone())
}

fn build_orchestrator(config: &ResolvedConfig) -> Result<Orchestrator> {
    config.validate()?;

    Ok(Orchestrator::new(
        Collaborators::from_config(config),
        Categorizer::new(config.keywords.clone()),
        shared_status(config),
        PipelineSettings::from_config(config),
    ))
}

/// Clear the running flag on Ctrl-C
fn stop_on_ctrl_c(running: RunningFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, finishing current track");
            running.stop();
        }
    });
}

/// Run the detection service until interrupted
async fn serve(config: &ResolvedConfig) -> Result<()> {
    let orchestrator = Arc::new(build_orchestrator(config)?);
    stop_on_ctrl_c(orchestrator.running_flag());

    eprintln!("Watching {} (Ctrl-C to stop)", config.ripper.device);
    orchestrator.run_service().await
}

/// Process the inserted disc once
async fn process_once(config: &ResolvedConfig) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    stop_on_ctrl_c(orchestrator.running_flag());

    let report = orchestrator.process_disc().await;
    let album = report.album.as_deref().unwrap_or("unidentified disc");

    match &report.outcome {
        RunOutcome::Completed => {
            eprintln!(
                "[Run {} completed: {} ({} tracks)]",
                report.run_id,
                album,
                report.processed_tracks.len()
            );
            Ok(())
        }
        RunOutcome::Failed { error } => {
            anyhow::bail!("Run {} failed on {}: {}", report.run_id, album, error)
        }
        RunOutcome::Aborted { reason } => {
            anyhow::bail!("Run {} aborted on {}: {}", report.run_id, album, reason)
        }
    }
}

/// Observer view of the shared status record
fn show_status(config: &ResolvedConfig, json: bool) -> Result<()> {
    let snapshot = shared_status(config).get_status();

    if json {
        let out = serde_json::to_string_pretty(&snapshot).context("Failed to serialize status")?;
        println!("{}", out);
        return Ok(());
    }

    match &snapshot.current_cd {
        Some(cd) => println!("Disc:      {} - {}", cd.artist, cd.name),
        None => println!("Disc:      (none)"),
    }
    println!(
        "State:     {}",
        if snapshot.processing { "processing" } else { "idle" }
    );
    if let Some(step) = &snapshot.current_step {
        println!("Step:      {}", step);
    }
    println!("Progress:  {}%", snapshot.progress);
    if snapshot.total_tracks > 0 {
        println!(
            "Track:     {}/{}",
            snapshot.current_track, snapshot.total_tracks
        );
    }
    if let Some(cover) = snapshot.current_cd.as_ref().and_then(|cd| cd.cover_path.as_ref()) {
        println!("Cover:     {}", cover.display());
    }
    match snapshot.age(Utc::now()) {
        Some(age) => println!("Updated:   {}s ago", age.num_seconds().max(0)),
        None => println!("Updated:   never"),
    }

    Ok(())
}

fn clear_status(config: &ResolvedConfig) -> Result<()> {
    shared_status(config)
        .clear()
        .context("Failed to clear status")?;
    eprintln!("Status cleared");
    Ok(())
}

/// Manual eject goes through the drive, then resets the record
async fn eject(config: &ResolvedConfig) -> Result<()> {
    let collaborators = Collaborators::from_config(config);
    let limit = config.timeouts.eject();

    tokio::time::timeout(limit, collaborators.detector.eject())
        .await
        .with_context(|| format!("Eject timed out after {}s", limit.as_secs()))??;

    shared_status(config)
        .clear()
        .context("Failed to clear status")?;
    eprintln!("Disc ejected");
    Ok(())
}

/// Dry-run the categorizer
fn categorize(
    config: &ResolvedConfig,
    artist: &str,
    album: &str,
    genre: Option<&str>,
    year: Option<i32>,
    titles: Vec<String>,
) -> Result<()> {
    let tracks: Vec<TrackDescriptor> = titles
        .into_iter()
        .zip(1..)
        .map(|(title, number)| TrackDescriptor::new(number, title, 0))
        .collect();

    let categorizer = Categorizer::new(config.keywords.clone());
    let result = categorizer.categorize(artist, album, genre, &tracks, year);
    let profile = config.ripper.profiles.get(result.category);

    println!("Category:   {}", result.category);
    println!("Confidence: {:.2}", result.confidence);
    println!("Reason:     {}", result.reason);
    println!("Profile:    {}", profile);

    Ok(())
}

/// List recent runs from the journal
async fn list_runs(config: &ResolvedConfig, limit: usize) -> Result<()> {
    let runs = journal::list_runs(&config.runs_dir()).await?;

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!(
        "{:<38} {:<20} {:<12} {:<8} {}",
        "RUN ID", "STARTED", "STATE", "TRACKS", "ALBUM"
    );
    println!("{}", "-".repeat(100));

    for run in runs.into_iter().take(limit) {
        let state = match &run.outcome {
            Some(RunOutcome::Completed) => "completed",
            Some(RunOutcome::Failed { .. }) => "failed",
            Some(RunOutcome::Aborted { .. }) => "aborted",
            None => "running",
        };
        println!(
            "{:<38} {:<20} {:<12} {:<8} {}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            state,
            format!("{}/{}", run.tracks_encoded, run.tracks_ripped + run.tracks_failed),
            run.album.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();

    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    println!("{}", yaml);

    Ok(())
}
