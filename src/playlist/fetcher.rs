//! Bulk ingestion of a remote playlist into a user's library.

use super::downloader::{PlaylistDownloader, PlaylistEntry};
use crate::media::{
    storage_name::AUDIO_EXTENSION, ByteSource, IngestionPipeline, MediaError, MediaResult,
};
use anyhow::{anyhow, Context};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

lazy_static! {
    static ref PLAYLIST_URL: Regex = Regex::new(
        r"^https?://(?:www\.|m\.|music\.)?youtube\.com/(?:playlist|watch)\?(?:[^#\s]*&)?list=[A-Za-z0-9_-]+(?:[&#][^\s]*)?$"
    )
    .unwrap();
}

/// Outcome of a playlist batch. Item failures never abort the batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub ingested_titles: Vec<String>,
    pub failed_count: usize,
    /// Set when the batch stopped early because it was cancelled.
    pub cancelled: bool,
}

pub fn validate_playlist_url(playlist_url: &str) -> MediaResult<()> {
    if PLAYLIST_URL.is_match(playlist_url.trim()) {
        Ok(())
    } else {
        Err(MediaError::InvalidInput(format!(
            "{:?} is not a playlist URL",
            playlist_url
        )))
    }
}

/// Name an item is ingested under, derived from its remote title.
fn display_name_for(title: &str) -> String {
    let name = title.trim().replace(['/', '\\'], "-");
    if name.ends_with(AUDIO_EXTENSION) {
        name
    } else {
        format!("{}{}", name, AUDIO_EXTENSION)
    }
}

pub struct PlaylistFetcher {
    downloader: Arc<dyn PlaylistDownloader>,
    ingestion: Arc<IngestionPipeline>,
    item_timeout: Duration,
    max_items: usize,
}

impl PlaylistFetcher {
    pub fn new(
        downloader: Arc<dyn PlaylistDownloader>,
        ingestion: Arc<IngestionPipeline>,
        item_timeout: Duration,
        max_items: usize,
    ) -> Self {
        Self {
            downloader,
            ingestion,
            item_timeout,
            max_items,
        }
    }

    /// Downloads every item of the playlist and ingests it for `owner_id`.
    ///
    /// Listing the playlist and each download are bounded by the item
    /// timeout. Items are processed one at a time. `cancel` is checked between
    /// items and interrupts the listing or a running download, an item already
    /// being ingested is completed.
    pub async fn fetch_playlist(
        &self,
        owner_id: usize,
        playlist_url: &str,
        cancel: &CancellationToken,
    ) -> MediaResult<BatchResult> {
        validate_playlist_url(playlist_url)?;
        let playlist_url = playlist_url.trim();

        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("User {} cancelled listing of {}", owner_id, playlist_url);
                return Ok(BatchResult {
                    cancelled: true,
                    ..Default::default()
                });
            }
            listed = tokio::time::timeout(
                self.item_timeout,
                self.downloader.list_entries(playlist_url),
            ) => listed,
        };
        let mut entries = match listed {
            Ok(entries) => entries.map_err(MediaError::RemoteFetch)?,
            Err(_) => {
                return Err(MediaError::RemoteFetch(anyhow!(
                    "listing {} timed out after {:?}",
                    playlist_url,
                    self.item_timeout
                )))
            }
        };
        if entries.len() > self.max_items {
            warn!(
                "Playlist {} has {} items, only the first {} are fetched",
                playlist_url,
                entries.len(),
                self.max_items
            );
            entries.truncate(self.max_items);
        }
        info!(
            "User {} fetching {} items from {}",
            owner_id,
            entries.len(),
            playlist_url
        );

        let work_dir = tempfile::Builder::new()
            .prefix("playlist-")
            .tempdir()
            .context("Failed to create playlist work directory")?;

        let mut result = BatchResult::default();
        for entry in entries {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            let downloaded = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    result.cancelled = true;
                    break;
                }
                downloaded = tokio::time::timeout(
                    self.item_timeout,
                    self.downloader.download_entry(&entry, work_dir.path()),
                ) => downloaded,
            };

            let path = match downloaded {
                Ok(Ok(path)) => path,
                Ok(Err(err)) => {
                    warn!("Failed to download {:?}: {:#}", entry.title, err);
                    result.failed_count += 1;
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Download of {:?} timed out after {:?}",
                        entry.title, self.item_timeout
                    );
                    result.failed_count += 1;
                    continue;
                }
            };

            match self.ingest_item(owner_id, &entry, &path).await {
                Ok(()) => result.ingested_titles.push(entry.title),
                Err(err) => {
                    warn!("Failed to ingest {:?}: {}", entry.title, err);
                    result.failed_count += 1;
                }
            }
        }

        info!(
            "User {} playlist batch done: {} ingested, {} failed{}",
            owner_id,
            result.ingested_titles.len(),
            result.failed_count,
            if result.cancelled { ", cancelled" } else { "" }
        );
        Ok(result)
    }

    async fn ingest_item(&self, owner_id: usize, entry: &PlaylistEntry, path: &Path) -> MediaResult<()> {
        let display_name = display_name_for(&entry.title);
        let ingested = self
            .ingestion
            .ingest(owner_id, &display_name, ByteSource::TempFile(path.to_path_buf()))
            .await;
        if let Err(err) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove downloaded file {:?}: {}", path, err);
        }
        ingested.map(|_| ())
    }
}
