//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases and media directory.

use super::constants::*;
use pezzottify_locker::media::{BlobStore, IngestionPipeline, LifecycleManager, SqliteMediaCatalogStore};
use pezzottify_locker::playlist::{PlaylistDownloader, PlaylistFetcher};
use pezzottify_locker::server::{make_app, RequestsLoggingLevel, ServerConfig};
use pezzottify_locker::user::{SqliteUserStore, UserManager};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated storage
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Directory holding the uploaded blobs
    pub media_path: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, with `TEST_USER` and
    /// `OTHER_USER` registered and playlist imports disabled.
    pub async fn spawn() -> Self {
        Self::spawn_with_downloader(None).await
    }

    /// Spawns a test server whose playlist imports go through `downloader`.
    pub async fn spawn_with_downloader(downloader: Option<Arc<dyn PlaylistDownloader>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let user_db_path = temp_dir.path().join("user.db");
        let media_path = temp_dir.path().join("uploads");

        let user_manager = UserManager::new(Box::new(
            SqliteUserStore::new(&user_db_path).expect("Failed to open user store"),
        ));
        for handle in [TEST_USER, OTHER_USER] {
            user_manager
                .register(handle, TEST_PASS)
                .expect("Failed to create test user");
        }

        let catalog = Arc::new(
            SqliteMediaCatalogStore::new(temp_dir.path().join("media.db"))
                .expect("Failed to open media catalog"),
        );
        let blobs = Arc::new(BlobStore::new(&media_path));
        blobs.init().await.expect("Failed to create media directory");
        let ingestion = Arc::new(IngestionPipeline::new(
            catalog.clone(),
            blobs.clone(),
            TEST_MAX_UPLOAD_SIZE_BYTES,
        ));
        let lifecycle = Arc::new(LifecycleManager::new(catalog, blobs));
        let playlist_fetcher = downloader.map(|downloader| {
            Arc::new(PlaylistFetcher::new(
                downloader,
                ingestion.clone(),
                Duration::from_secs(5),
                50,
            ))
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
            max_upload_size_bytes: TEST_MAX_UPLOAD_SIZE_BYTES,
            registration_enabled: true,
        };
        let user_store =
            SqliteUserStore::new(&user_db_path).expect("Failed to open user store");
        let app = make_app(
            config,
            Box::new(user_store),
            ingestion,
            lifecycle,
            playlist_fetcher,
        );

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            media_path,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Names of the files currently in the media directory
    #[allow(dead_code)]
    pub fn media_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.media_path)
            .expect("Failed to read media directory")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Waits for the server to become ready by polling `/`
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
