use axum::extract::FromRef;

use crate::media::{IngestionPipeline, LifecycleManager};
use crate::playlist::PlaylistFetcher;
use crate::user::UserManager;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserManager = Arc<Mutex<UserManager>>;
pub type GuardedIngestionPipeline = Arc<IngestionPipeline>;
pub type GuardedLifecycleManager = Arc<LifecycleManager>;
pub type OptionalPlaylistFetcher = Option<Arc<PlaylistFetcher>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub user_manager: GuardedUserManager,
    pub ingestion: GuardedIngestionPipeline,
    pub lifecycle: GuardedLifecycleManager,
    pub playlist_fetcher: OptionalPlaylistFetcher,
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedIngestionPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.ingestion.clone()
    }
}

impl FromRef<ServerState> for GuardedLifecycleManager {
    fn from_ref(input: &ServerState) -> Self {
        input.lifecycle.clone()
    }
}

impl FromRef<ServerState> for OptionalPlaylistFetcher {
    fn from_ref(input: &ServerState) -> Self {
        input.playlist_fetcher.clone()
    }
}
