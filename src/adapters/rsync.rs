//! Transfer adapter over `ssh` and `rsync`.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::sync::mpsc;

use super::process::{run_checked, run_with_progress};
use super::Transfer;

/// Options shared by `ssh` and the `rsync -e` transport (no host key checking)
const SSH_OPTIONS: [&str; 6] = [
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "LogLevel=ERROR",
];

/// Single-quote a word for a POSIX shell
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}

#[derive(Debug, Clone)]
pub struct RsyncTransfer {
    host: String,
    user: String,
    compression: bool,
}

impl RsyncTransfer {
    pub fn new(host: impl Into<String>, user: impl Into<String>, compression: bool) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            compression,
        }
    }

    fn destination(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }

    fn mkdir_command(&self, remote_dir: &str) -> Command {
        let mut command = Command::new("ssh");
        command
            .args(SSH_OPTIONS)
            .arg(self.destination())
            .arg(format!("mkdir -p -- {}", shell_quote(remote_dir)));
        command
    }

    fn rsync_command(&self, local_dir: &Path, remote_dir: &str) -> Command {
        let mut command = Command::new("rsync");
        command
            .arg("-avh")
            // Remote path goes to the far side unsplit and unexpanded
            .arg("--protect-args")
            .arg("-e")
            .arg(format!("ssh {}", SSH_OPTIONS.join(" ")));
        if self.compression {
            command.arg("-z");
        }
        command
            .args(["--info=progress2", "--partial"])
            .arg(local_dir)
            .arg(format!(
                "{}:{}/",
                self.destination(),
                remote_dir.trim_end_matches('/')
            ));
        command
    }
}

#[async_trait]
impl Transfer for RsyncTransfer {
    async fn sync(&self, local_dir: &Path, remote_dir: &str, progress: mpsc::Sender<u8>) -> Result<()> {
        if !local_dir.is_dir() {
            anyhow::bail!("Nothing to sync, not a directory: {}", local_dir.display());
        }

        run_checked(&mut self.mkdir_command(remote_dir), "ssh mkdir").await?;
        run_with_progress(self.rsync_command(local_dir, remote_dir), "rsync", &progress).await?;

        let _ = progress.try_send(100);
        Ok(())
    }

    /// Empties and removes the local album directory
    async fn cleanup_local(&self, local_dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(local_dir)
            .await
            .with_context(|| format!("Failed to read {}", local_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let removed = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            removed.with_context(|| format!("Failed to remove {}", path.display()))?;
        }

        fs::remove_dir(local_dir)
            .await
            .with_context(|| format!("Failed to remove {}", local_dir.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_rsync_arguments() {
        let transfer = RsyncTransfer::new("nas.local", "media", true);
        let command = transfer.rsync_command(Path::new("/rips/Artist/Album"), "/srv/music/Artist/");
        let args = args(&command);

        assert!(args.contains(&"-z".to_string()));
        assert!(args.contains(&"--protect-args".to_string()));
        assert_eq!(args[args.len() - 2], "/rips/Artist/Album");
        assert_eq!(args[args.len() - 1], "media@nas.local:/srv/music/Artist/");
    }

    #[test]
    fn test_mkdir_quotes_remote_path() {
        let transfer = RsyncTransfer::new("nas.local", "", false);
        let command = transfer.mkdir_command("/srv/music/The Band");
        let args = args(&command);

        assert_eq!(args[args.len() - 2], "nas.local");
        assert_eq!(args[args.len() - 1], "mkdir -p -- '/srv/music/The Band'");
        assert!(!args.contains(&"-z".to_string()));
    }

    #[test]
    fn test_mkdir_does_not_expand_artist_metadata() {
        let transfer = RsyncTransfer::new("nas.local", "media", false);
        let command = transfer.mkdir_command("/srv/music/Ke$ha `echo X` it's $(id)");
        let args = args(&command);

        assert_eq!(
            args[args.len() - 1],
            "mkdir -p -- '/srv/music/Ke$ha `echo X` it'\\''s $(id)'"
        );
    }

    #[test]
    fn test_shell_quote_survives_sh() {
        let temp = tempfile::TempDir::new().unwrap();
        let target = temp.path().join("Ke$ha `echo X` it's $(echo Y)");
        let script = format!("mkdir -p -- {}", shell_quote(&target.to_string_lossy()));

        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(&script)
            .status()
            .unwrap();

        assert!(status.success());
        assert!(target.is_dir());
        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Ke$ha `echo X` it's $(echo Y)".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_local_removes_album_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let album = temp.path().join("Album");
        std::fs::create_dir_all(album.join("scans")).unwrap();
        std::fs::write(album.join("01 - One.flac"), b"x").unwrap();
        std::fs::write(album.join("scans").join("front.jpg"), b"x").unwrap();

        let transfer = RsyncTransfer::new("nas.local", "media", false);
        transfer.cleanup_local(&album).await.unwrap();

        assert!(!album.exists());
        assert!(temp.path().exists());
    }
}
