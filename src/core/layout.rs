//! Where ripped and encoded files live on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::EncodingProfile;

/// Directory layout of albums under the output root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputLayout {
    /// `<root>/<artist>/<album>`
    #[default]
    #[serde(rename = "artist/album")]
    ArtistAlbum,

    /// `<root>/<album>`
    #[serde(rename = "album")]
    Album,

    /// `<root>/<artist> - <album>`
    #[serde(rename = "flat")]
    Flat,
}

/// Make `name` safe to use as a single path component.
///
/// Reserved and control characters become `_`, runs of `_` collapse,
/// surrounding spaces and dots are trimmed. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for c in name.chars() {
        let c = match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        };

        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Directory an album's files are written to
pub fn album_dir(root: &Path, layout: OutputLayout, artist: &str, album: &str) -> PathBuf {
    match layout {
        OutputLayout::ArtistAlbum => root
            .join(sanitize_filename(artist))
            .join(sanitize_filename(album)),
        OutputLayout::Album => root.join(sanitize_filename(album)),
        OutputLayout::Flat => root.join(sanitize_filename(&format!("{} - {}", artist, album))),
    }
}

/// Intermediate extraction target for a track
pub fn wav_path(album_dir: &Path, number: u32) -> PathBuf {
    album_dir.join(format!("track{:02}.wav", number))
}

/// Final encoded file for a track
pub fn track_path(album_dir: &Path, number: u32, title: &str, profile: &EncodingProfile) -> PathBuf {
    album_dir.join(format!(
        "{:02} - {}.{}",
        number,
        sanitize_filename(title),
        profile.extension()
    ))
}

/// Parent of the album directory relative to the output root
/// (`<artist>` for the artist/album layout, empty otherwise)
pub fn relative_parent(root: &Path, album_dir: &Path) -> PathBuf {
    album_dir
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Remote directory the album directory is synced into
pub fn remote_dir(remote_root: &str, relative: &Path) -> String {
    let root = remote_root.trim_end_matches('/');
    if relative.as_os_str().is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, relative.display())
    }
}
