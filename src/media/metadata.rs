//! Tag extraction for freshly written blobs.
//!
//! Extraction is best effort: a file lofty cannot parse still gets a record,
//! with empty metadata.

use super::blob_store::artwork_file_name;
use super::models::{MediaMetadata, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use super::storage_name::AUDIO_EXTENSION;
use anyhow::{Context, Result};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, warn};

/// Reads tags, duration and cover art of the blob at `blob_path`.
///
/// The title falls back to `display_name` without its extension. The cover,
/// when present, is written next to the blob. This is blocking file IO.
pub fn extract_metadata(blob_path: &Path, display_name: &str) -> MediaMetadata {
    match read_tags(blob_path, display_name) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!("Could not read metadata of {:?}: {:#}", blob_path, err);
            MediaMetadata::default()
        }
    }
}

fn read_tags(blob_path: &Path, display_name: &str) -> Result<MediaMetadata> {
    let tagged_file = Probe::open(blob_path)?
        .guess_file_type()?
        .read()
        .context("Unrecognized audio container")?;

    let duration = tagged_file.properties().duration();
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());
    if tag.is_none() {
        debug!("No tags in {:?}", blob_path);
    }

    Ok(MediaMetadata {
        title: Some(
            tag.and_then(|t| clean(t.title()))
                .unwrap_or_else(|| fallback_title(display_name)),
        ),
        artist: Some(
            tag.and_then(|t| clean(t.artist()))
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        ),
        album: Some(
            tag.and_then(|t| clean(t.album()))
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
        ),
        year: tag.and_then(|t| t.year()).filter(|year| *year > 0),
        genre: tag.and_then(|t| clean(t.genre())),
        duration_seconds: Some(duration.as_secs_f64()),
        artwork: tag.and_then(|t| save_artwork(t, blob_path)),
    })
}

fn clean(value: Option<Cow<'_, str>>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn fallback_title(display_name: &str) -> String {
    let stem = display_name
        .strip_suffix(AUDIO_EXTENSION)
        .unwrap_or(display_name)
        .trim();
    if stem.is_empty() {
        display_name.to_string()
    } else {
        stem.to_string()
    }
}

fn save_artwork(tag: &Tag, blob_path: &Path) -> Option<String> {
    let pictures = tag.pictures();
    let picture = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())?;
    if picture.data().is_empty() {
        return None;
    }

    let extension = artwork_extension(picture)?;
    let storage_name = blob_path.file_name()?.to_str()?;
    let file_name = artwork_file_name(storage_name, extension);
    match std::fs::write(blob_path.with_file_name(&file_name), picture.data()) {
        Ok(()) => Some(file_name),
        Err(err) => {
            warn!("Failed to write artwork of {:?}: {}", blob_path, err);
            None
        }
    }
}

fn artwork_extension(picture: &Picture) -> Option<&'static str> {
    match picture.mime_type() {
        Some(MimeType::Png) => Some("png"),
        Some(MimeType::Jpeg) => Some("jpg"),
        Some(MimeType::Gif) => Some("gif"),
        Some(MimeType::Bmp) => Some("bmp"),
        Some(MimeType::Tiff) => Some("tiff"),
        _ => infer::get(picture.data())
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map(|kind| kind.extension()),
    }
}
