//! Playlist batches: list a remote playlist, download each item, ingest it.

mod downloader;
mod fetcher;
mod yt_dlp;

pub use downloader::{PlaylistDownloader, PlaylistEntry};
pub use fetcher::{validate_playlist_url, BatchResult, PlaylistFetcher};
pub use yt_dlp::{YtDlpDownloader, YtDlpError};
