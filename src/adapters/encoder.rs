//! Encoder adapter over the `lame` and `flac` command-line tools.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::process::run_checked;
use super::Encoder;
use crate::domain::EncodingProfile;

#[derive(Debug, Clone)]
pub struct CommandEncoder {
    lame_bin: String,
    flac_bin: String,
}

impl Default for CommandEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self {
            lame_bin: "lame".to_string(),
            flac_bin: "flac".to_string(),
        }
    }

    pub fn with_binaries(lame: impl Into<String>, flac: impl Into<String>) -> Self {
        Self {
            lame_bin: lame.into(),
            flac_bin: flac.into(),
        }
    }

    fn command(&self, src: &Path, dest: &Path, profile: &EncodingProfile) -> Command {
        match profile {
            EncodingProfile::Mp3 { bitrate } => {
                let mut command = Command::new(&self.lame_bin);
                command
                    .args(["--preset", "cbr"])
                    .arg(bitrate.to_string())
                    .args(["-h", "--quiet"])
                    .arg(src)
                    .arg(dest);
                command
            }
            EncodingProfile::Flac { compression } => {
                let mut command = Command::new(&self.flac_bin);
                command
                    .arg(format!("-{}", compression))
                    .args(["--totally-silent", "-f", "-o"])
                    .arg(dest)
                    .arg(src);
                command
            }
        }
    }
}

#[async_trait]
impl Encoder for CommandEncoder {
    async fn encode(&self, src: &Path, dest: &Path, profile: &EncodingProfile) -> Result<()> {
        let what = format!("{} encoder", profile.extension());
        run_checked(&mut self.command(src, dest, profile), &what).await?;

        let size = tokio::fs::metadata(dest)
            .await
            .map(|m| m.len())
            .with_context(|| format!("Encoder produced no file: {}", dest.display()))?;
        if size == 0 {
            anyhow::bail!("Encoder produced an empty file: {}", dest.display());
        }

        Ok(())
    }
}
