//! Routes for the signed-in user's media library.

use super::{
    session::Session,
    state::{GuardedIngestionPipeline, GuardedLifecycleManager, OptionalPlaylistFetcher, ServerState},
    stream_media::stream_media,
};
use crate::media::{ByteSource, DeleteOutcome, DeleteTarget, MediaError};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const UPLOAD_FIELD_NAME: &str = "file";
/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

#[derive(Deserialize, Debug)]
struct DeleteManyBody {
    #[serde(default)]
    pub storage_names: Vec<String>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Deserialize, Debug)]
struct PlaylistBody {
    pub playlist_url: String,
}

pub fn media_error_response(err: MediaError) -> Response {
    match err {
        MediaError::InvalidInput(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
        MediaError::NotFound => StatusCode::NOT_FOUND.into_response(),
        MediaError::StorageFailure(err) => {
            error!("Storage failure: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        MediaError::RemoteFetch(err) => {
            warn!("Remote fetch failed: {:#}", err);
            (StatusCode::BAD_GATEWAY, format!("{:#}", err)).into_response()
        }
    }
}

async fn list_media(session: Session, State(lifecycle): State<GuardedLifecycleManager>) -> Response {
    match lifecycle.list(session.user_id) {
        Ok(records) => Json(records).into_response(),
        Err(err) => media_error_response(err),
    }
}

async fn get_media(
    session: Session,
    State(lifecycle): State<GuardedLifecycleManager>,
    Path(storage_name): Path<String>,
) -> Response {
    match lifecycle.get(session.user_id, &storage_name) {
        Ok(record) => Json(record).into_response(),
        Err(err) => media_error_response(err),
    }
}

async fn get_artwork(
    session: Session,
    State(lifecycle): State<GuardedLifecycleManager>,
    Path(storage_name): Path<String>,
) -> Response {
    match lifecycle.read_artwork(session.user_id, &storage_name).await {
        Ok((_, bytes)) => {
            let content_type = infer::get(&bytes)
                .map(|kind| kind.mime_type())
                .unwrap_or("application/octet-stream");
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(err) => media_error_response(err),
    }
}

async fn delete_media(
    session: Session,
    State(lifecycle): State<GuardedLifecycleManager>,
    Path(storage_name): Path<String>,
) -> Response {
    match lifecycle.delete_one(session.user_id, &storage_name).await {
        Ok(DeleteOutcome::Deleted) => StatusCode::OK.into_response(),
        Ok(DeleteOutcome::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => media_error_response(err),
    }
}

async fn delete_many_media(
    session: Session,
    State(lifecycle): State<GuardedLifecycleManager>,
    Json(body): Json<DeleteManyBody>,
) -> Response {
    let target = if body.all {
        DeleteTarget::All
    } else {
        DeleteTarget::StorageNames(body.storage_names)
    };
    match lifecycle.delete_many(session.user_id, target).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => media_error_response(err),
    }
}

/// Writes the `file` field of the upload to a temporary file.
async fn spool_upload(multipart: &mut Multipart) -> Result<Option<(String, NamedTempFile)>, Response> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();

        let temp_file = NamedTempFile::new().map_err(|err| {
            error!("Failed to create upload spool file: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?;
        let mut out = tokio::fs::File::create(temp_file.path()).await.map_err(|err| {
            error!("Failed to open upload spool file: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?;
        while let Some(chunk) = field.chunk().await.map_err(IntoResponse::into_response)? {
            out.write_all(&chunk).await.map_err(|err| {
                error!("Failed to spool upload: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            })?;
        }
        out.flush().await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?;
        return Ok(Some((original_name, temp_file)));
    }
    Ok(None)
}

async fn upload_media(
    session: Session,
    State(ingestion): State<GuardedIngestionPipeline>,
    mut multipart: Multipart,
) -> Response {
    let (original_name, temp_file) = match spool_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, "Missing file field").into_response();
        }
        Err(response) => return response,
    };

    // Ingestion runs to completion even if the client goes away.
    let owner_id = session.user_id;
    let task = tokio::spawn(async move {
        let source = ByteSource::TempFile(temp_file.path().to_path_buf());
        let result = ingestion.ingest(owner_id, &original_name, source).await;
        drop(temp_file);
        result
    });

    match task.await {
        Ok(Ok(record)) => (StatusCode::CREATED, Json(record)).into_response(),
        Ok(Err(err)) => media_error_response(err),
        Err(err) => {
            error!("Upload task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn fetch_playlist(
    session: Session,
    State(fetcher): State<OptionalPlaylistFetcher>,
    Json(body): Json<PlaylistBody>,
) -> Response {
    let fetcher = match fetcher {
        Some(fetcher) => fetcher,
        None => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };

    // Dropping this handler, e.g. on client disconnect, cancels the batch
    // between items.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let owner_id = session.user_id;
    let task = tokio::spawn(async move {
        fetcher
            .fetch_playlist(owner_id, &body.playlist_url, &cancel)
            .await
    });

    match task.await {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(err)) => media_error_response(err),
        Err(err) => {
            error!("Playlist task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Request body limit for uploads of at most `max_upload_size_bytes`.
fn upload_body_limit(max_upload_size_bytes: u64) -> usize {
    let limit = max_upload_size_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

pub fn make_media_routes(state: ServerState) -> Router {
    let upload_limit = upload_body_limit(state.config.max_upload_size_bytes);
    Router::new()
        .route("/", get(list_media))
        .route(
            "/upload",
            post(upload_media).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/delete", post(delete_many_media))
        .route("/playlist", post(fetch_playlist))
        .route("/{storage_name}", get(get_media).delete(delete_media))
        .route("/{storage_name}/stream", get(stream_media))
        .route("/{storage_name}/artwork", get(get_artwork))
        .with_state(state)
}
