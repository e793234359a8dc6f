//! cdrip - Audio CD ripping service
//!
//! Watches an optical drive and turns every inserted audio disc into
//! tagged files in a remote library.
//!
//! # Pipeline
//!
//! identify → categorize → rip → encode → tag → sync → eject
//!
//! - The categorizer sorts a disc into children's content, audiobook or
//!   music, which selects the encoding profile and remote destination
//! - A single track failing to rip or encode is skipped, not fatal
//! - Progress is published to a shared status file for observer processes
//! - Every run is journaled as JSONL under `<home>/runs/<run-id>/`
//!
//! # Modules
//!
//! - `adapters`: External tools (cdparanoia, lame/flac, rsync, lofty)
//! - `core`: Categorizer, status store, journal, orchestrator
//! - `domain`: Data structures (album, category, run, events)
//! - `config`: YAML configuration and discovery
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the service
//! cdrip serve
//!
//! # Watch progress from another shell
//! cdrip status
//!
//! # Try the categorizer
//! cdrip categorize "Bibi Blocksberg" "Folge 1" --genre Hörspiel
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{Categorizer, Orchestrator, SharedStatus};
pub use crate::domain::{AlbumDescriptor, Category, CategoryResult, RunReport, Stage};
