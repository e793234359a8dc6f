//! Domain types for the ripping service.
//!
//! - Album: identified disc metadata and per-track tags
//! - Category: content buckets and per-category tables
//! - Profile: encoding targets
//! - Run / Events: per-disc run state and its journal

pub mod album;
pub mod category;
pub mod events;
pub mod profile;
pub mod run;

pub use album::{AlbumDescriptor, TrackDescriptor, TrackTags};
pub use category::{Category, CategoryResult, CategoryTable};
pub use events::{RunEvent, RunEventType};
pub use profile::EncodingProfile;
pub use run::{EncodedTrack, PipelineRun, RunOutcome, RunReport, RunSummary, Stage, TrackOutcome};
