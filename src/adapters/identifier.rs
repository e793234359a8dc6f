//! Identification through an external helper command plus HTTP cover download.
//!
//! The helper reads the disc TOC, performs the metadata lookup and prints the
//! album as JSON on stdout:
//!
//! ```json
//! {"artist": "...", "title": "...", "year": 1999, "genre": "...",
//!  "release_id": "...", "tracks": [{"number": 1, "title": "...", "duration_secs": 215}]}
//! ```
//!
//! An unknown disc is reported as empty output or `null`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::process::Command;
use tracing::debug;

use super::process::run_checked;
use super::Identifier;
use crate::domain::AlbumDescriptor;

/// Placeholder in helper arguments replaced by the drive's device path
pub const DEVICE_PLACEHOLDER: &str = "{device}";

pub struct CommandIdentifier {
    command: String,
    args: Vec<String>,
    device: String,
    cover_base_url: String,
    client: reqwest::Client,
}

impl CommandIdentifier {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        device: impl Into<String>,
        cover_base_url: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            device: device.into(),
            cover_base_url: cover_base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn helper_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(DEVICE_PLACEHOLDER, &self.device))
            .collect()
    }

    fn cover_url(&self, release_id: &str) -> String {
        format!(
            "{}/{}/front-500",
            self.cover_base_url.trim_end_matches('/'),
            release_id
        )
    }
}

/// Parse helper output; blank output or `null` means the disc is unknown
pub fn parse_helper_output(stdout: &str) -> Result<Option<AlbumDescriptor>> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(stdout).context("Identification helper printed invalid JSON")
}

#[async_trait]
impl Identifier for CommandIdentifier {
    async fn identify(&self) -> Result<Option<AlbumDescriptor>> {
        let mut command = Command::new(&self.command);
        command.args(self.helper_args());

        let output = run_checked(&mut command, "identification helper").await?;
        let stdout = String::from_utf8(output.stdout)
            .context("Identification helper output is not valid UTF-8")?;

        parse_helper_output(&stdout)
    }

    async fn download_cover(&self, release_id: &str) -> Result<Option<Vec<u8>>> {
        let url = self.cover_url(release_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request cover art: {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(release_id, "No cover art for release");
            return Ok(None);
        }

        let bytes = response
            .error_for_status()
            .with_context(|| format!("Cover art request failed: {}", url))?
            .bytes()
            .await
            .context("Failed to read cover art body")?;

        if bytes.is_empty() {
            return Ok(None);
        }

        Ok(Some(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_disc_outputs() {
        assert!(parse_helper_output("").unwrap().is_none());
        assert!(parse_helper_output("  null\n").unwrap().is_none());
        assert!(parse_helper_output("{oops").is_err());
    }

    #[test]
    fn test_device_placeholder_and_cover_url() {
        let identifier = CommandIdentifier::new(
            "cd-identify",
            vec!["--device".to_string(), "{device}".to_string()],
            "/dev/sr1",
            "https://coverartarchive.org/release/",
        );

        assert_eq!(identifier.helper_args(), vec!["--device", "/dev/sr1"]);
        assert_eq!(
            identifier.cover_url("abc"),
            "https://coverartarchive.org/release/abc/front-500"
        );
    }

    #[tokio::test]
    async fn test_identify_reads_helper_json() {
        let json = r#"{"artist":"A","title":"B","tracks":[{"number":1,"title":"T"}]}"#;
        let identifier = CommandIdentifier::new(
            "sh",
            vec!["-c".to_string(), format!("echo '{}'", json)],
            "/dev/sr0",
            "http://localhost",
        );

        let album = identifier.identify().await.unwrap().unwrap();
        assert_eq!(album.artist, "A");
        assert_eq!(album.tracks.len(), 1);
    }
}
