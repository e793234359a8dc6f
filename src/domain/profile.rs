//! Encoding profiles selected per category.

use std::fmt;

use serde::{Deserialize, Serialize};

fn default_bitrate() -> u32 {
    320
}

fn default_compression() -> u8 {
    8
}

/// Target format plus its quality knob.
///
/// YAML form: `{format: mp3, bitrate: 320}` or `{format: flac, compression: 8}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum EncodingProfile {
    Mp3 {
        #[serde(default = "default_bitrate")]
        bitrate: u32,
    },
    Flac {
        #[serde(default = "default_compression")]
        compression: u8,
    },
}

impl EncodingProfile {
    /// File extension of encoded output
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 { .. } => "mp3",
            Self::Flac { .. } => "flac",
        }
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp3 { bitrate } => write!(f, "MP3 {} kbps", bitrate),
            Self::Flac { compression } => write!(f, "FLAC level {}", compression),
        }
    }
}
