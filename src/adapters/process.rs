//! Subprocess helpers shared by the command-line adapters.

use std::process::{Output, Stdio};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex_lite::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Run a command to completion, failing on a non-zero exit
pub async fn run_checked(command: &mut Command, what: &str) -> Result<Output> {
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}", what))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        anyhow::bail!("{} failed with exit code {}: {}", what, exit_code, stderr.trim());
    }

    Ok(output)
}

/// Run a command while forwarding the percentages it prints.
///
/// Both output streams are scanned; `\r`-separated progress lines count as
/// lines. Updates are dropped when the receiver lags behind.
pub async fn run_with_progress(
    mut command: Command,
    what: &str,
    progress: &mpsc::Sender<u8>,
) -> Result<()> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn {}", what))?;

    let stdout = child.stdout.take().context("stdout not captured")?;
    let stderr = child.stderr.take().context("stderr not captured")?;

    let (stdout_tail, stderr_tail, status) = tokio::join!(
        pump(stdout, progress),
        pump(stderr, progress),
        child.wait()
    );

    let status = status.with_context(|| format!("Failed to wait for {}", what))?;
    if !status.success() {
        let detail = stderr_tail
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| stdout_tail.ok())
            .unwrap_or_default();
        anyhow::bail!(
            "{} failed with exit code {}: {}",
            what,
            status.code().unwrap_or(-1),
            detail
        );
    }

    Ok(())
}

/// Scan a stream for progress, returning its last non-empty line
async fn pump<R: AsyncRead + Unpin>(mut reader: R, progress: &mpsc::Sender<u8>) -> std::io::Result<String> {
    let mut buf = [0u8; 4096];
    let mut line = Vec::new();
    let mut last = String::new();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        for &byte in &buf[..n] {
            if byte == b'\r' || byte == b'\n' {
                finish_line(&mut line, &mut last, progress);
            } else {
                line.push(byte);
            }
        }
    }
    finish_line(&mut line, &mut last, progress);

    Ok(last)
}

fn finish_line(line: &mut Vec<u8>, last: &mut String, progress: &mpsc::Sender<u8>) {
    if line.is_empty() {
        return;
    }

    let text = String::from_utf8_lossy(line).trim().to_string();
    line.clear();

    if let Some(percent) = parse_percent(&text) {
        let _ = progress.try_send(percent);
    }
    if !text.is_empty() {
        *last = text;
    }
}

/// Last `NN%` or `NN.N%` figure in a line, capped at 100
pub fn parse_percent(line: &str) -> Option<u8> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%").ok())
        .as_ref()?;

    let value: f64 = re
        .captures_iter(line)
        .last()?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;

    Some(value.min(100.0) as u8)
}
