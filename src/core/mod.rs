//! Core ripping logic.
//!
//! This module contains:
//! - Categorizer: keyword heuristics choosing a content category
//! - Status: the shared status record read by observers
//! - Layout: output directories and file names
//! - Journal: append-only per-run event log
//! - Orchestrator: drives a disc through every stage

pub mod categorizer;
pub mod journal;
pub mod layout;
pub mod orchestrator;
pub mod status;

pub use categorizer::{Categorizer, KeywordSets};
pub use journal::{list_runs, RunJournal};
pub use layout::OutputLayout;
pub use orchestrator::{
    Collaborators, Orchestrator, PipelineError, PipelineSettings, RunningFlag,
};
pub use status::{
    FileStatusStore, MemoryStatusStore, SharedStatus, StatusError, StatusSnapshot, StatusStore,
};
