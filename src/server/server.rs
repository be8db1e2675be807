use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, error, info, warn};

use super::{
    log_requests,
    media_routes::make_media_routes,
    session::{Session, COOKIE_SESSION_TOKEN_KEY},
    state::*,
    ServerConfig,
};
use crate::media::{IngestionPipeline, LifecycleManager};
use crate::playlist::PlaylistFetcher;
use crate::user::{AuthTokenValue, UserManager, UserStore};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub user_id: Option<usize>,
    pub playlist_fetch_enabled: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct CredentialsBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Serialize)]
struct RegisterSuccessResponse {
    user_id: usize,
}

fn lock_user_manager(user_manager: &GuardedUserManager) -> MutexGuard<'_, UserManager> {
    user_manager.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        user_id: session.map(|s| s.user_id),
        playlist_fetch_enabled: state.playlist_fetcher.is_some(),
    };
    Json(stats)
}

async fn register(
    State(config): State<ServerConfig>,
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    if !config.registration_enabled {
        return StatusCode::FORBIDDEN.into_response();
    }
    debug!("register() called for {}", body.user_handle);
    match lock_user_manager(&user_manager).register(&body.user_handle, &body.password) {
        Ok(user_id) => {
            info!("Registered user {} with id {}", body.user_handle.trim(), user_id);
            (StatusCode::CREATED, Json(RegisterSuccessResponse { user_id })).into_response()
        }
        Err(err) => {
            warn!("Registration rejected: {:#}", err);
            (StatusCode::BAD_REQUEST, format!("{}", err)).into_response()
        }
    }
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    debug!("login() called for {}", body.user_handle);
    match lock_user_manager(&user_manager).login(&body.user_handle, &body.password) {
        Ok(Some(auth_token)) => {
            let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, auth_token.value.0.clone()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            (
                StatusCode::CREATED,
                [(header::SET_COOKIE, cookie.to_string())],
                Json(LoginSuccessResponse {
                    token: auth_token.value.0,
                }),
            )
                .into_response()
        }
        Ok(None) => StatusCode::FORBIDDEN.into_response(),
        Err(err) => {
            error!("Error with auth token generation: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    match lock_user_manager(&user_manager).logout(session.user_id, &AuthTokenValue(session.token)) {
        Ok(()) => {
            let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
                .same_site(SameSite::Lax)
                .build();
            (StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]).into_response()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

impl ServerState {
    fn new(
        config: ServerConfig,
        user_manager: UserManager,
        ingestion: Arc<IngestionPipeline>,
        lifecycle: Arc<LifecycleManager>,
        playlist_fetcher: Option<Arc<PlaylistFetcher>>,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            user_manager: Arc::new(Mutex::new(user_manager)),
            ingestion,
            lifecycle,
            playlist_fetcher,
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    user_store: Box<dyn UserStore>,
    ingestion: Arc<IngestionPipeline>,
    lifecycle: Arc<LifecycleManager>,
    playlist_fetcher: Option<Arc<PlaylistFetcher>>,
) -> Router {
    let user_manager = UserManager::new(user_store);
    let state = ServerState::new(
        config.clone(),
        user_manager,
        ingestion,
        lifecycle,
        playlist_fetcher,
    );

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let media_routes = make_media_routes(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)).with_state(state.clone()),
    };

    home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/media", media_routes)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state, log_requests))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

pub async fn run_server(
    config: ServerConfig,
    user_store: Box<dyn UserStore>,
    ingestion: Arc<IngestionPipeline>,
    lifecycle: Arc<LifecycleManager>,
    playlist_fetcher: Option<Arc<PlaylistFetcher>>,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, user_store, ingestion, lifecycle, playlist_fetcher);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    Ok(axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?)
}
