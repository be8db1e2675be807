use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One item of a remote playlist, as listed before downloading.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Retrieves playlist contents from a remote service.
#[async_trait]
pub trait PlaylistDownloader: Send + Sync {
    /// Lists the items of the playlist at `playlist_url`, in playlist order.
    async fn list_entries(&self, playlist_url: &str) -> Result<Vec<PlaylistEntry>>;

    /// Downloads one item as an audio file inside `dest_dir`, returning its path.
    async fn download_entry(&self, entry: &PlaylistEntry, dest_dir: &Path) -> Result<PathBuf>;
}
