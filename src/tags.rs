//! ID3 metadata: the tag model, merging user edits into it, and reading or
//! writing it with lofty.

use std::path::Path;

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AudioError, Result};

/// Metadata fields carried from the source file to the export
///
/// Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TagSet {
    pub fn is_empty(&self) -> bool {
        *self == TagSet::default()
    }
}

/// The fields a user can edit before export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOverrides {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

/// Combine stored tags with user edits
///
/// An override replaces the stored value only when it is a non-empty string.
/// Fields that cannot be overridden pass through unchanged. Contents are not
/// validated.
pub fn merge(original: &TagSet, overrides: &TagOverrides) -> TagSet {
    fn pick(edit: &Option<String>, stored: &Option<String>) -> Option<String> {
        match edit {
            Some(value) if !value.is_empty() => Some(value.clone()),
            _ => stored.clone(),
        }
    }

    TagSet {
        title: pick(&overrides.title, &original.title),
        artist: pick(&overrides.artist, &original.artist),
        album: pick(&overrides.album, &original.album),
        year: pick(&overrides.year, &original.year),
        ..original.clone()
    }
}

/// Read the primary (or first) tag of an audio file
///
/// Returns `None` when the file cannot be parsed or carries no tag.
pub fn read_tags<P: AsRef<Path>>(path: P) -> Option<TagSet> {
    let path = path.as_ref();

    let tagged_file = match lofty::read_from_path(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Error reading tags from {}: {}", path.display(), e);
            return None;
        }
    };

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())?;

    let tags = TagSet {
        title: tag.title().map(|s| s.into_owned()),
        artist: tag.artist().map(|s| s.into_owned()),
        album: tag.album().map(|s| s.into_owned()),
        year: tag
            .year()
            .map(|y| y.to_string())
            .or_else(|| tag.get_string(&ItemKey::RecordingDate).map(str::to_string)),
        genre: tag.genre().map(|s| s.into_owned()),
        track_number: tag.track().map(|t| t.to_string()),
        album_artist: tag.get_string(&ItemKey::AlbumArtist).map(str::to_string),
        composer: tag.get_string(&ItemKey::Composer).map(str::to_string),
        comment: tag.comment().map(|s| s.into_owned()),
    };

    debug!(path = %path.display(), ?tags, "read tags");
    Some(tags)
}

/// Write a tag set as an ID3v2 tag, replacing any existing ID3v2 tag
pub fn write_tags<P: AsRef<Path>>(path: P, tags: &TagSet) -> Result<()> {
    let path = path.as_ref();
    let tag = to_id3v2(tags);

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| AudioError::TagWriteFailure {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

    debug!(path = %path.display(), "wrote tags");
    Ok(())
}

fn to_id3v2(tags: &TagSet) -> Tag {
    let mut tag = Tag::new(TagType::Id3v2);

    if let Some(title) = &tags.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &tags.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &tags.album {
        tag.set_album(album.clone());
    }
    if let Some(year) = &tags.year {
        // Free-form years ("2001-05-04", "c. 1970") are kept as text
        match year.trim().parse::<u32>() {
            Ok(y) => tag.set_year(y),
            Err(_) => {
                tag.insert_text(ItemKey::RecordingDate, year.clone());
            }
        }
    }
    if let Some(genre) = &tags.genre {
        tag.set_genre(genre.clone());
    }
    if let Some(track) = &tags.track_number {
        // "3/12" style values keep only the track index
        if let Some(Ok(n)) = track.split('/').next().map(|t| t.trim().parse::<u32>()) {
            tag.set_track(n);
        }
    }
    if let Some(album_artist) = &tags.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
    }
    if let Some(composer) = &tags.composer {
        tag.insert_text(ItemKey::Composer, composer.clone());
    }
    if let Some(comment) = &tags.comment {
        tag.set_comment(comment.clone());
    }

    tag
}
