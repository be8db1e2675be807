//! Playlist downloads through the `yt-dlp` command line tool.

use super::downloader::{PlaylistDownloader, PlaylistEntry};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum YtDlpError {
    #[error("yt-dlp failed: {0}")]
    CommandFailed(String),

    #[error("Invalid yt-dlp output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatPlaylistEntry>,
}

#[derive(Debug, Deserialize)]
struct FlatPlaylistEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
}

fn parse_flat_playlist(json: &str) -> Result<Vec<PlaylistEntry>, YtDlpError> {
    let playlist: FlatPlaylist = serde_json::from_str(json)
        .map_err(|e| YtDlpError::InvalidOutput(format!("JSON parse error: {}", e)))?;

    Ok(playlist
        .entries
        .into_iter()
        .filter_map(|entry| {
            let id = entry.id.filter(|id| !id.is_empty())?;
            let url = entry
                .url
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));
            let title = entry
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| id.clone());
            Some(PlaylistEntry { id, title, url })
        })
        .collect())
}

/// The final file path is the last non empty line yt-dlp prints.
fn parse_printed_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}

pub struct YtDlpDownloader {
    binary: PathBuf,
}

impl YtDlpDownloader {
    pub fn new<P: AsRef<Path>>(binary: P) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    /// `target` comes from remote data, so it always follows `--`.
    fn command(&self, args: &[&str], target: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(args).arg("--").arg(target);
        command
    }

    async fn run(&self, args: &[&str], target: &str) -> Result<String> {
        debug!("Running {:?} {:?} {}", self.binary, args, target);
        let output = self
            .command(args, target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {:?}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(YtDlpError::CommandFailed(stderr.trim().to_string()).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PlaylistDownloader for YtDlpDownloader {
    async fn list_entries(&self, playlist_url: &str) -> Result<Vec<PlaylistEntry>> {
        let stdout = self
            .run(&["--flat-playlist", "-J", "--no-warnings"], playlist_url)
            .await?;
        Ok(parse_flat_playlist(&stdout)?)
    }

    async fn download_entry(&self, entry: &PlaylistEntry, dest_dir: &Path) -> Result<PathBuf> {
        let template = dest_dir.join("%(id)s.%(ext)s");
        let template = template.to_string_lossy().into_owned();
        let stdout = self
            .run(
                &[
                    "-x",
                    "--audio-format",
                    "mp3",
                    "--no-playlist",
                    "--no-progress",
                    "--no-simulate",
                    "--print",
                    "after_move:filepath",
                    "-o",
                    template.as_str(),
                ],
                &entry.url,
            )
            .await?;

        let path = parse_printed_path(&stdout).ok_or_else(|| {
            YtDlpError::InvalidOutput(format!("no output file reported for {}", entry.id))
        })?;
        if !path.starts_with(dest_dir) || !path.is_file() {
            bail!("yt-dlp reported unexpected output file {:?}", path);
        }
        Ok(path)
    }
}
