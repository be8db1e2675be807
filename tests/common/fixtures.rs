//! Test data: fake audio payloads and a scripted playlist downloader

#![allow(dead_code)]

use super::constants::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use pezzottify_locker::playlist::{PlaylistDownloader, PlaylistEntry};
use std::path::{Path, PathBuf};

/// Bytes that pass for an upload. Tag parsing fails on them, which ingestion tolerates.
pub fn fake_mp3_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

/// Lists `TEST_PLAYLIST_TITLES` and fails to download `FAILING_PLAYLIST_TITLE`.
pub struct FakeDownloader;

#[async_trait]
impl PlaylistDownloader for FakeDownloader {
    async fn list_entries(&self, _playlist_url: &str) -> Result<Vec<PlaylistEntry>> {
        Ok(TEST_PLAYLIST_TITLES
            .iter()
            .enumerate()
            .map(|(i, title)| PlaylistEntry {
                id: format!("id{}", i + 1),
                title: title.to_string(),
                url: format!("https://www.youtube.com/watch?v=id{}", i + 1),
            })
            .collect())
    }

    async fn download_entry(&self, entry: &PlaylistEntry, dest_dir: &Path) -> Result<PathBuf> {
        if entry.title == FAILING_PLAYLIST_TITLE {
            bail!("Video unavailable");
        }
        let path = dest_dir.join(format!("{}.mp3", entry.id));
        tokio::fs::write(&path, fake_mp3_bytes(entry.id.len() as u8, 2048)).await?;
        Ok(path)
    }
}
