//! Adapter interfaces for the external tools a rip depends on.
//!
//! The orchestrator only talks to these traits. Shipped implementations wrap
//! command-line tools (`cdparanoia`, `eject`, `lame`, `flac`, `rsync`, an
//! identification helper) and the `lofty` tagging library; tests substitute
//! recording fakes.
//!
//! Every method returns `anyhow::Result`; an `Err` is a failure of that call.
//! Callers bound each call with a timeout, and the subprocess adapters kill
//! their child when the call is dropped.

pub mod cdparanoia;
pub mod encoder;
pub mod identifier;
pub mod process;
pub mod rsync;
pub mod tagger;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{AlbumDescriptor, EncodingProfile, TrackTags};

pub use cdparanoia::{CdparanoiaDrive, RipQuality};
pub use encoder::CommandEncoder;
pub use identifier::CommandIdentifier;
pub use rsync::RsyncTransfer;
pub use tagger::LoftyTagWriter;

/// Drive state and control
#[async_trait]
pub trait DiscDetector: Send + Sync {
    /// Any medium is in the drive
    async fn is_present(&self) -> Result<bool>;

    /// The medium is a readable audio disc
    async fn is_audio_disc(&self) -> Result<bool>;

    async fn eject(&self) -> Result<()>;
}

/// Metadata lookup for the inserted disc
#[async_trait]
pub trait Identifier: Send + Sync {
    /// `None` when the disc is not known to the lookup service
    async fn identify(&self) -> Result<Option<AlbumDescriptor>>;

    /// Front cover for a release, `None` when there is none
    async fn download_cover(&self, release_id: &str) -> Result<Option<Vec<u8>>>;
}

/// Reads one track off the disc into an intermediate file
#[async_trait]
pub trait TrackExtractor: Send + Sync {
    /// Percentages (0..=100) are sent on `progress` while the track is read
    async fn extract_track(&self, number: u32, dest: &Path, progress: mpsc::Sender<u8>) -> Result<()>;
}

#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, src: &Path, dest: &Path, profile: &EncodingProfile) -> Result<()>;
}

#[async_trait]
pub trait TagWriter: Send + Sync {
    async fn write_tags(&self, path: &Path, tags: &TrackTags, cover: Option<&[u8]>) -> Result<()>;
}

/// Ships an album directory to the remote library
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Copy `local_dir` into `remote_dir`, reporting percentages on `progress`
    async fn sync(&self, local_dir: &Path, remote_dir: &str, progress: mpsc::Sender<u8>) -> Result<()>;

    /// Remove the local copy after a successful transfer
    async fn cleanup_local(&self, local_dir: &Path) -> Result<()>;
}
