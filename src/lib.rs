//! Pezzottify Locker Library
//!
//! Per-user MP3 locker: uploads, playback, deletion and playlist imports.
//! The modules are exposed for testing and for the `locker-server` binary.

pub mod config;
pub mod media;
pub mod playlist;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use media::{BlobStore, IngestionPipeline, LifecycleManager, SqliteMediaCatalogStore};
pub use playlist::{PlaylistFetcher, YtDlpDownloader};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use user::{SqliteUserStore, UserStore};
