//! Tag writer backed by `lofty`.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};

use super::TagWriter;
use crate::domain::TrackTags;

/// Writes tags in the file's native tag format (ID3v2 for MP3, Vorbis comments for FLAC)
#[derive(Debug, Clone, Default)]
pub struct LoftyTagWriter;

impl LoftyTagWriter {
    pub fn new() -> Self {
        Self
    }
}

fn write_tags_blocking(path: &Path, tags: &TrackTags, cover: Option<&[u8]>) -> Result<()> {
    let mut tagged_file = Probe::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .read()
        .with_context(|| format!("Failed to read tags of {}", path.display()))?;

    if tagged_file.primary_tag().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .primary_tag_mut()
        .context("File has no writable tag")?;

    tag.set_artist(tags.artist.clone());
    tag.set_album(tags.album.clone());
    tag.set_title(tags.title.clone());
    tag.set_track(tags.track_number);
    tag.set_track_total(tags.track_total);

    if let Some(genre) = &tags.genre {
        tag.set_genre(genre.clone());
    }
    if let Some(year) = tags.year.and_then(|y| u32::try_from(y).ok()) {
        tag.set_year(year);
    }

    if let Some(bytes) = cover {
        let mut picture = Picture::from_reader(&mut Cursor::new(bytes))
            .context("Cover art is not a supported image")?;
        picture.set_pic_type(PictureType::CoverFront);
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .with_context(|| format!("Failed to save tags to {}", path.display()))?;

    Ok(())
}

#[async_trait]
impl TagWriter for LoftyTagWriter {
    async fn write_tags(&self, path: &Path, tags: &TrackTags, cover: Option<&[u8]>) -> Result<()> {
        let path: PathBuf = path.to_path_buf();
        let tags = tags.clone();
        let cover = cover.map(<[u8]>::to_vec);

        tokio::task::spawn_blocking(move || write_tags_blocking(&path, &tags, cover.as_deref()))
            .await
            .context("Tag writer task panicked")?
    }
}
