//! Catalog records for user-owned media files.

use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "unknown artist";
pub const UNKNOWN_ALBUM: &str = "unknown album";

/// Tag set extracted from an audio container.
///
/// An empty value (`MediaMetadata::default()`) means extraction failed, the
/// record is still valid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub duration_seconds: Option<f64>,
    /// Blob store file name of the extracted cover image, if any.
    pub artwork: Option<String>,
}

impl MediaMetadata {
    pub fn is_empty(&self) -> bool {
        self == &MediaMetadata::default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    pub owner_id: usize,
    pub storage_name: String,
    pub original_name: String,
    pub metadata: MediaMetadata,
    /// Unix seconds.
    pub uploaded_at: i64,
}

/// A record that has not been committed to the catalog yet.
#[derive(Clone, Debug)]
pub struct NewMediaRecord {
    pub owner_id: usize,
    pub storage_name: String,
    pub original_name: String,
    pub metadata: MediaMetadata,
    pub uploaded_at: i64,
}

/// Listing entry, what the library view needs without the full tag set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaRecordSummary {
    pub storage_name: String,
    pub original_name: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_seconds: Option<f64>,
    pub has_artwork: bool,
    pub uploaded_at: i64,
}

impl From<MediaRecord> for MediaRecordSummary {
    fn from(record: MediaRecord) -> Self {
        MediaRecordSummary {
            storage_name: record.storage_name,
            original_name: record.original_name,
            title: record.metadata.title,
            artist: record.metadata.artist,
            duration_seconds: record.metadata.duration_seconds,
            has_artwork: record.metadata.artwork.is_some(),
            uploaded_at: record.uploaded_at,
        }
    }
}

/// Outcome of deleting a single record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Which records a bulk delete targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    All,
    StorageNames(Vec<String>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub deleted_count: usize,
    /// Targets that could not be removed from the catalog.
    pub failed_count: usize,
}
