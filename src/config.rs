//! Configuration for the ripping service.
//!
//! Configuration sources (highest priority first):
//! 1. `--config <path>` on the command line
//! 2. `CDRIP_CONFIG` environment variable
//! 3. Config file discovery: `.cdrip/config.yaml` in the current directory or a parent
//! 4. Built-in defaults
//!
//! The state home is `CDRIP_HOME`, else `paths.home` from the file, else `~/.cdrip`.
//! Relative paths in a config file are resolved against the directory that
//! contains `.cdrip/` (or the file's own directory for files elsewhere).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::RipQuality;
use crate::core::categorizer::KeywordSets;
use crate::core::layout::OutputLayout;
use crate::domain::{Category, CategoryTable, EncodingProfile};

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub paths: PathsConfig,
    pub ripper: RipperConfig,
    pub output: OutputConfig,
    pub sync: SyncConfig,
    pub status: StatusConfig,
    pub service: ServiceConfig,
    pub timeouts: TimeoutConfig,
    pub identify: IdentifyConfig,
    pub categorizer: CategorizerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (journal, status file)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RipperConfig {
    pub device: String,
    pub quality: RipQuality,

    /// Encoding profile per category; music is the fallback
    pub profiles: CategoryTable<EncodingProfile>,
}

impl Default for RipperConfig {
    fn default() -> Self {
        let mp3 = EncodingProfile::Mp3 { bitrate: 320 };
        Self {
            device: "/dev/sr0".to_string(),
            quality: RipQuality::default(),
            profiles: CategoryTable::new(EncodingProfile::Flac { compression: 8 })
                .with(Category::Children, mp3.clone())
                .with(Category::Audiobook, mp3),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub local_path: Option<String>,
    pub organize_by: OutputLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub auto_eject: bool,

    /// Remove the local album directory after a successful transfer
    pub cleanup: bool,
    pub host: String,
    pub user: String,
    pub compression: bool,

    /// Remote root per category; music is the fallback
    pub remote_paths: CategoryTable<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_eject: true,
            cleanup: true,
            host: String::new(),
            user: String::new(),
            compression: true,
            remote_paths: CategoryTable::new("audio/music".to_string())
                .with(Category::Children, "audio/children".to_string())
                .with(Category::Audiobook, "audio/audiobooks".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub file: Option<String>,
    pub cover_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Pause between disc detection polls
    pub poll_interval_secs: u64,

    /// Pause after a failed run
    pub failure_backoff_secs: u64,

    /// Pause after an unexpected error in the loop
    pub error_backoff_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            failure_backoff_secs: 30,
            error_backoff_secs: 10,
        }
    }
}

impl ServiceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Upper bounds for each collaborator call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub probe_secs: u64,
    pub identify_secs: u64,
    pub extract_secs: u64,
    pub encode_secs: u64,
    pub tag_secs: u64,
    pub transfer_secs: u64,
    pub eject_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: 10,
            identify_secs: 60,
            extract_secs: 900,
            encode_secs: 300,
            tag_secs: 30,
            transfer_secs: 1800,
            eject_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn identify(&self) -> Duration {
        Duration::from_secs(self.identify_secs)
    }

    pub fn extract(&self) -> Duration {
        Duration::from_secs(self.extract_secs)
    }

    pub fn encode(&self) -> Duration {
        Duration::from_secs(self.encode_secs)
    }

    pub fn tag(&self) -> Duration {
        Duration::from_secs(self.tag_secs)
    }

    pub fn transfer(&self) -> Duration {
        Duration::from_secs(self.transfer_secs)
    }

    pub fn eject(&self) -> Duration {
        Duration::from_secs(self.eject_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Helper that prints the inserted disc's metadata as JSON
    pub command: String,

    /// `{device}` is replaced by the drive's device path
    pub args: Vec<String>,

    pub cover_base_url: String,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            command: "cd-identify".to_string(),
            args: vec!["--device".to_string(), "{device}".to_string()],
            cover_base_url: "https://coverartarchive.org/release".to_string(),
        }
    }
}

/// Replacement keyword lists; a missing list keeps the built-in one
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    pub children_keywords: Option<Vec<String>>,
    pub audiobook_keywords: Option<Vec<String>>,
    pub music_genres: Option<Vec<String>>,
}

impl CategorizerConfig {
    pub fn keyword_sets(&self) -> KeywordSets {
        let defaults = KeywordSets::default();
        KeywordSets::new(
            self.children_keywords.clone().unwrap_or(defaults.children),
            self.audiobook_keywords.clone().unwrap_or(defaults.audiobook),
            self.music_genres.clone().unwrap_or(defaults.music_genres),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub home: PathBuf,

    /// Path to config file (if one was used)
    pub config_file: Option<PathBuf>,

    pub ripper: RipperConfig,
    pub local_path: PathBuf,
    pub organize_by: OutputLayout,
    pub sync: SyncConfig,
    pub status_file: PathBuf,
    pub cover_file: PathBuf,
    pub service: ServiceConfig,
    pub timeouts: TimeoutConfig,
    pub identify: IdentifyConfig,
    pub keywords: KeywordSets,
    pub logging: LoggingConfig,
}

impl ResolvedConfig {
    /// Journal directory ($CDRIP_HOME/runs)
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.ripper.device.trim().is_empty() {
            anyhow::bail!("ripper.device must not be empty");
        }
        if self.sync.enabled && self.sync.host.trim().is_empty() {
            anyhow::bail!("sync.enabled is set but sync.host is empty");
        }
        if self.service.poll_interval_secs == 0 {
            anyhow::bail!("service.poll_interval_secs must be at least 1");
        }
        Ok(())
    }
}

/// Find config file by searching the current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".cdrip").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Directory relative config paths are resolved against
fn base_dir(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if parent.file_name().map_or(false, |n| n == ".cdrip") {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// Turn a parsed file into absolute settings
pub fn resolve(
    file: ConfigFile,
    config_path: Option<PathBuf>,
    env_home: Option<PathBuf>,
    default_home: PathBuf,
) -> ResolvedConfig {
    let base = config_path
        .as_deref()
        .map(base_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let home = env_home
        .or_else(|| file.paths.home.as_deref().map(|h| resolve_path(&base, h)))
        .unwrap_or(default_home);

    let local_path = file
        .output
        .local_path
        .as_deref()
        .map(|p| resolve_path(&base, p))
        .unwrap_or_else(|| home.join("rips"));

    let status_file = file
        .status
        .file
        .as_deref()
        .map(|p| resolve_path(&base, p))
        .unwrap_or_else(|| home.join("status.json"));

    let cover_file = file
        .status
        .cover_file
        .as_deref()
        .map(|p| resolve_path(&base, p))
        .unwrap_or_else(|| home.join("current-cover.jpg"));

    ResolvedConfig {
        home,
        config_file: config_path,
        ripper: file.ripper,
        local_path,
        organize_by: file.output.organize_by,
        sync: file.sync,
        status_file,
        cover_file,
        service: file.service,
        timeouts: file.timeouts,
        identify: file.identify,
        keywords: file.categorizer.keyword_sets(),
        logging: file.logging,
    }
}

/// Load configuration from all sources
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".cdrip");

    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("CDRIP_CONFIG").ok().map(PathBuf::from));

    let config_path = match named {
        Some(path) if !path.exists() => {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        Some(path) => Some(path),
        None => find_config_file(),
    };

    let file = match &config_path {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let env_home = std::env::var("CDRIP_HOME").ok().map(PathBuf::from);

    Ok(resolve(file, config_path, env_home, default_home))
}
