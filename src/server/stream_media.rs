//! Audio streaming with byte range support.

use super::{
    media_routes::media_error_response,
    session::Session,
    state::{GuardedLifecycleManager, ServerState},
};
use axum::{
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

const HEADER_BYTE_RANGE: &str = "Range";
const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
const STREAM_BUFFER_SIZE: usize = 4096 * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref().strip_prefix("bytes=")?;
        let (start, end) = v.split_once('-')?;
        if end.contains('-') || end.contains(',') {
            return None;
        }

        Some(ByteRange {
            start_inclusive: start.trim().parse::<u64>().ok(),
            end_inclusive: end.trim().parse::<u64>().ok(),
        })
    }

    /// Resolves the range against a file length into inclusive offsets.
    ///
    /// `bytes=-n` means the last `n` bytes. Returns `None` when the range
    /// cannot be satisfied.
    fn resolve(&self, file_length: u64) -> Option<(u64, u64)> {
        if file_length == 0 {
            return None;
        }
        let last = file_length - 1;
        let (start, end) = match (self.start_inclusive, self.end_inclusive) {
            (None, None) => (0, last),
            (Some(start), None) => (start, last),
            (Some(start), Some(end)) => (start, end.min(last)),
            (None, Some(0)) => return None,
            (None, Some(suffix)) => (file_length.saturating_sub(suffix), last),
        };
        if start > end || start > last {
            None
        } else {
            Some((start, end))
        }
    }
}

pub struct ByteRangeExtractionError {}

impl IntoResponse for ByteRangeExtractionError {
    fn into_response(self) -> Response {
        StatusCode::BAD_REQUEST.into_response()
    }
}

impl FromRequestParts<ServerState> for Option<ByteRange> {
    type Rejection = ByteRangeExtractionError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_BYTE_RANGE)
            .and_then(|x| x.to_str().ok())
            .and_then(ByteRange::parse))
    }
}

pub async fn stream_media(
    session: Session,
    byte_range: Option<ByteRange>,
    State(lifecycle): State<GuardedLifecycleManager>,
    Path(storage_name): Path<String>,
) -> Response {
    let blob = match lifecycle.open(session.user_id, &storage_name).await {
        Ok(blob) => blob,
        Err(err) => return media_error_response(err),
    };
    debug!("Streaming {} ({} bytes)", storage_name, blob.size);

    let file_length = blob.size;
    let (start, end) = match byte_range {
        None => (0, file_length.saturating_sub(1)),
        Some(range) => match range.resolve(file_length) {
            Some(resolved) => resolved,
            None => {
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{}", file_length))
                    .body(Body::empty())
                    .unwrap_or_else(|_| StatusCode::RANGE_NOT_SATISFIABLE.into_response());
            }
        },
    };
    let chunk_size = if file_length == 0 { 0 } else { end - start + 1 };

    let mut file = blob.file;
    if start > 0 && file.seek(SeekFrom::Start(start)).await.is_err() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let file_reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file.take(chunk_size));
    let stream = ReaderStream::with_capacity(file_reader, STREAM_BUFFER_SIZE);

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, chunk_size);
    response = match byte_range {
        None => response.status(StatusCode::OK),
        Some(_) => response.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, file_length),
        ),
    };

    match response.body(Body::from_stream(stream)) {
        Ok(response) => response,
        Err(err) => {
            error!("Failed to build stream response: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ByteRange;

    fn assert_byte_range(s: &str, a: Option<u64>, b: Option<u64>) {
        assert_eq!(ByteRange::parse(s), Some(ByteRange::new(a, b)));
    }

    fn assert_no_byte_range(s: &str) {
        assert_eq!(ByteRange::parse(s), None);
    }

    #[test]
    fn parses_byte_range() {
        assert_no_byte_range("asd");
        assert_no_byte_range("bytes=");
        assert_no_byte_range("bytes=1-2,4-5");
        assert_byte_range("bytes=-", None, None);
        assert_byte_range("bytes=11-", Some(11), None);
        assert_byte_range("bytes=-111", None, Some(111));
        assert_byte_range("bytes=11-111", Some(11), Some(111));
    }

    #[test]
    fn resolves_against_file_length() {
        assert_eq!(ByteRange::new(None, None).resolve(100), Some((0, 99)));
        assert_eq!(ByteRange::new(Some(10), None).resolve(100), Some((10, 99)));
        assert_eq!(ByteRange::new(Some(10), Some(19)).resolve(100), Some((10, 19)));
        assert_eq!(ByteRange::new(Some(90), Some(500)).resolve(100), Some((90, 99)));
        assert_eq!(ByteRange::new(None, Some(10)).resolve(100), Some((90, 99)));
        assert_eq!(ByteRange::new(None, Some(500)).resolve(100), Some((0, 99)));
    }

    #[test]
    fn rejects_unsatisfiable_ranges() {
        assert_eq!(ByteRange::new(Some(100), None).resolve(100), None);
        assert_eq!(ByteRange::new(Some(20), Some(10)).resolve(100), None);
        assert_eq!(ByteRange::new(None, Some(0)).resolve(100), None);
        assert_eq!(ByteRange::new(None, None).resolve(0), None);
    }
}
