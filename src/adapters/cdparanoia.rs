//! Drive adapter over `cdparanoia` and `eject`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::process::{run_checked, run_with_progress};
use super::{DiscDetector, TrackExtractor};

/// Extraction mode, mapped to a cdparanoia flag (`-Z`, `-Y`, or none)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RipQuality {
    #[default]
    Paranoia,
    Fast,
    Normal,
}

impl RipQuality {
    fn flag(self) -> Option<&'static str> {
        match self {
            Self::Paranoia => Some("-Z"),
            Self::Fast => Some("-Y"),
            Self::Normal => None,
        }
    }
}

/// Audio CD drive driven through command-line tools
#[derive(Debug, Clone)]
pub struct CdparanoiaDrive {
    device: PathBuf,
    quality: RipQuality,
    cdparanoia_bin: String,
    eject_bin: String,
}

impl CdparanoiaDrive {
    pub fn new(device: impl Into<PathBuf>, quality: RipQuality) -> Self {
        Self {
            device: device.into(),
            quality,
            cdparanoia_bin: "cdparanoia".to_string(),
            eject_bin: "eject".to_string(),
        }
    }

    /// Use custom binaries (tests, non-standard installs)
    pub fn with_binaries(mut self, cdparanoia: impl Into<String>, eject: impl Into<String>) -> Self {
        self.cdparanoia_bin = cdparanoia.into();
        self.eject_bin = eject.into();
        self
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    /// `cdparanoia -Q` exits 0 only when it can read an audio TOC
    async fn query_toc(&self) -> bool {
        let mut command = Command::new(&self.cdparanoia_bin);
        command.arg("-d").arg(&self.device).arg("-vsQ");

        match run_checked(&mut command, "cdparanoia query").await {
            Ok(_) => true,
            Err(e) => {
                debug!(device = %self.device.display(), error = %e, "No audio TOC");
                false
            }
        }
    }

    /// Any medium that yields a byte counts as present
    async fn device_readable(&self) -> bool {
        let Ok(mut file) = tokio::fs::File::open(&self.device).await else {
            return false;
        };
        let mut byte = [0u8; 1];
        matches!(file.read(&mut byte).await, Ok(1))
    }
}

#[async_trait]
impl DiscDetector for CdparanoiaDrive {
    async fn is_present(&self) -> Result<bool> {
        if !self.device.exists() {
            return Ok(false);
        }
        Ok(self.query_toc().await || self.device_readable().await)
    }

    async fn is_audio_disc(&self) -> Result<bool> {
        if !self.device.exists() {
            return Ok(false);
        }
        Ok(self.query_toc().await)
    }

    async fn eject(&self) -> Result<()> {
        let mut command = Command::new(&self.eject_bin);
        command.arg(&self.device);
        run_checked(&mut command, "eject").await?;
        Ok(())
    }
}

#[async_trait]
impl TrackExtractor for CdparanoiaDrive {
    async fn extract_track(&self, number: u32, dest: &Path, progress: mpsc::Sender<u8>) -> Result<()> {
        let mut command = Command::new(&self.cdparanoia_bin);
        if let Some(flag) = self.quality.flag() {
            command.arg(flag);
        }
        command
            .arg("-d")
            .arg(&self.device)
            .arg(number.to_string())
            .arg(dest);

        run_with_progress(command, "cdparanoia", &progress).await?;

        let size = tokio::fs::metadata(dest)
            .await
            .map(|m| m.len())
            .with_context(|| format!("cdparanoia produced no file: {}", dest.display()))?;
        if size == 0 {
            anyhow::bail!("cdparanoia produced no audio for track {}", number);
        }

        let _ = progress.try_send(100);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_flags() {
        assert_eq!(RipQuality::Paranoia.flag(), Some("-Z"));
        assert_eq!(RipQuality::Fast.flag(), Some("-Y"));
        assert_eq!(RipQuality::Normal.flag(), None);
    }

    #[tokio::test]
    async fn test_missing_device_is_not_present() {
        let drive = CdparanoiaDrive::new("/nonexistent/sr9", RipQuality::default());
        assert!(!drive.is_present().await.unwrap());
        assert!(!drive.is_audio_disc().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_output_keeps_io_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("track01.wav");
        let drive = CdparanoiaDrive::new("/dev/sr0", RipQuality::Normal).with_binaries("true", "true");
        let (tx, _rx) = mpsc::channel(8);

        let err = drive.extract_track(1, &dest, tx).await.unwrap_err();

        assert!(err.to_string().contains("produced no file"));
        let io = err.root_cause().downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }
}
