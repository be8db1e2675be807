use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pezzottify_locker::config;
use pezzottify_locker::media::{BlobStore, IngestionPipeline, LifecycleManager, SqliteMediaCatalogStore};
use pezzottify_locker::playlist::{PlaylistFetcher, YtDlpDownloader};
use pezzottify_locker::server::{run_server, RequestsLoggingLevel};
use pezzottify_locker::user::SqliteUserStore;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (media.db, user.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// Directory holding the uploaded files. Defaults to `<db_dir>/uploads`.
    #[clap(long, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = config::DEFAULT_PORT)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Largest accepted upload, in bytes.
    #[clap(long, default_value_t = config::DEFAULT_MAX_UPLOAD_SIZE_BYTES)]
    pub max_upload_size_bytes: u64,

    /// Reject new account registrations.
    #[clap(long)]
    pub disable_registration: bool,

    /// Path to the yt-dlp executable used for playlist imports.
    #[clap(long)]
    pub yt_dlp_path: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            media_path: args.media_path.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            max_upload_size_bytes: args.max_upload_size_bytes,
            disable_registration: args.disable_registration,
            yt_dlp_path: args.yt_dlp_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // TOML overrides CLI
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  media_path: {:?}", app_config.media_path);
    info!("  port: {}", app_config.port);
    info!("  max_upload_size_bytes: {}", app_config.max_upload_size_bytes);

    info!(
        "Opening media catalog database at {:?}...",
        app_config.media_db_path()
    );
    let catalog = Arc::new(SqliteMediaCatalogStore::new(app_config.media_db_path())?);
    let user_store = SqliteUserStore::new(app_config.user_db_path())?;

    let blobs = Arc::new(BlobStore::new(&app_config.media_path));
    blobs
        .init()
        .await
        .with_context(|| format!("Failed to prepare media directory {:?}", app_config.media_path))?;

    let ingestion = Arc::new(IngestionPipeline::new(
        catalog.clone(),
        blobs.clone(),
        app_config.max_upload_size_bytes,
    ));
    let lifecycle = Arc::new(LifecycleManager::new(catalog, blobs));

    // Nothing is being ingested yet, so any blob without a catalog row is a leftover.
    let swept = lifecycle.sweep_orphan_blobs().await?;
    if swept > 0 {
        warn!("Removed {} orphaned files from {:?}", swept, app_config.media_path);
    }

    let playlist_fetcher = if app_config.playlist.enabled {
        info!(
            "Playlist imports enabled using {}",
            app_config.playlist.yt_dlp_path
        );
        Some(Arc::new(PlaylistFetcher::new(
            Arc::new(YtDlpDownloader::new(&app_config.playlist.yt_dlp_path)),
            ingestion.clone(),
            app_config.playlist.item_timeout(),
            app_config.playlist.max_items,
        )))
    } else {
        info!("Playlist imports disabled");
        None
    };

    info!("Ready to serve at port {}!", app_config.port);
    run_server(
        app_config.server_config(),
        Box::new(user_store),
        ingestion,
        lifecycle,
        playlist_fetcher,
    )
    .await
}
