//! Identified disc metadata.

use serde::{Deserialize, Serialize};

/// One track as reported by the identification step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// 1-based position on the disc
    pub number: u32,

    pub title: String,

    #[serde(default)]
    pub duration_secs: u32,
}

impl TrackDescriptor {
    pub fn new(number: u32, title: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            number,
            title: title.into(),
            duration_secs,
        }
    }
}

/// Metadata for one physical disc.
///
/// Owned by the orchestrator for the duration of a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumDescriptor {
    pub artist: String,

    /// Album title
    pub title: String,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub genre: Option<String>,

    #[serde(default)]
    pub tracks: Vec<TrackDescriptor>,

    /// Release identifier used to fetch cover art
    #[serde(default)]
    pub release_id: Option<String>,

    #[serde(skip)]
    pub cover: Option<Vec<u8>>,
}

impl AlbumDescriptor {
    /// "Artist - Title" for logs and status output
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    /// Tracks in ascending disc order
    pub fn ordered_tracks(&self) -> Vec<&TrackDescriptor> {
        let mut tracks: Vec<&TrackDescriptor> = self.tracks.iter().collect();
        tracks.sort_by_key(|t| t.number);
        tracks
    }
}

/// Tag values written into one encoded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub track_number: u32,
    pub track_total: u32,
}

impl TrackTags {
    /// Album-level values combined with one track's title and position
    pub fn for_track(album: &AlbumDescriptor, track: &TrackDescriptor) -> Self {
        Self {
            artist: album.artist.clone(),
            album: album.title.clone(),
            title: track.title.clone(),
            year: album.year,
            genre: album.genre.clone(),
            track_number: track.number,
            track_total: album.tracks.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_album_from_helper_json() {
        let json = r#"{
            "artist": "Pink Floyd",
            "title": "The Dark Side of the Moon",
            "year": 1973,
            "tracks": [
                {"number": 2, "title": "Breathe"},
                {"number": 1, "title": "Speak to Me", "duration_secs": 68}
            ]
        }"#;

        let album: AlbumDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(album.genre, None);
        assert!(album.cover.is_none());

        let ordered: Vec<u32> = album.ordered_tracks().iter().map(|t| t.number).collect();
        assert_eq!(ordered, vec![1, 2]);
    }

    #[test]
    fn test_track_tags_carry_album_values() {
        let album = AlbumDescriptor {
            artist: "Artist".to_string(),
            title: "Album".to_string(),
            year: Some(2001),
            genre: Some("Rock".to_string()),
            tracks: vec![
                TrackDescriptor::new(1, "One", 100),
                TrackDescriptor::new(2, "Two", 100),
            ],
            ..Default::default()
        };

        let tags = TrackTags::for_track(&album, &album.tracks[1]);
        assert_eq!(tags.title, "Two");
        assert_eq!(tags.track_number, 2);
        assert_eq!(tags.track_total, 2);
        assert_eq!(tags.year, Some(2001));
    }
}
