mod file_config;

pub use file_config::{FileConfig, PlaylistConfig};

use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3002;
pub const DEFAULT_MAX_UPLOAD_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub max_upload_size_bytes: u64,
    pub disable_registration: bool,
    pub yt_dlp_path: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            media_path: None,
            port: DEFAULT_PORT,
            logging_level: RequestsLoggingLevel::default(),
            frontend_dir_path: None,
            max_upload_size_bytes: DEFAULT_MAX_UPLOAD_SIZE_BYTES,
            disable_registration: false,
            yt_dlp_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub max_upload_size_bytes: u64,
    pub registration_enabled: bool,

    pub playlist: PlaylistSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSettings {
    pub enabled: bool,
    pub yt_dlp_path: String,
    pub item_timeout_sec: u64,
    pub max_items: usize,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            yt_dlp_path: "yt-dlp".to_string(),
            item_timeout_sec: 300,
            max_items: 100,
        }
    }
}

impl PlaylistSettings {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_sec)
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.join("uploads"));

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let max_upload_size_bytes = file
            .max_upload_size_bytes
            .unwrap_or(cli.max_upload_size_bytes);
        if max_upload_size_bytes == 0 {
            bail!("max_upload_size_bytes must be greater than 0");
        }

        let registration_enabled = file
            .registration_enabled
            .unwrap_or(!cli.disable_registration);

        let playlist_file = file.playlist.unwrap_or_default();
        let defaults = PlaylistSettings::default();
        let playlist = PlaylistSettings {
            enabled: playlist_file.enabled.unwrap_or(defaults.enabled),
            yt_dlp_path: playlist_file
                .yt_dlp_path
                .or_else(|| cli.yt_dlp_path.clone())
                .unwrap_or(defaults.yt_dlp_path),
            item_timeout_sec: playlist_file
                .item_timeout_sec
                .unwrap_or(defaults.item_timeout_sec),
            max_items: playlist_file.max_items.unwrap_or(defaults.max_items),
        };

        Ok(Self {
            db_dir,
            media_path,
            port,
            logging_level,
            frontend_dir_path,
            max_upload_size_bytes,
            registration_enabled,
            playlist,
        })
    }

    pub fn media_db_path(&self) -> PathBuf {
        self.db_dir.join("media.db")
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            frontend_dir_path: self.frontend_dir_path.clone(),
            max_upload_size_bytes: self.max_upload_size_bytes,
            registration_enabled: self.registration_enabled,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
