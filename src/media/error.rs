use thiserror::Error;

/// Errors surfaced by single-item media operations.
///
/// Ownership mismatches are reported as `NotFound`, so callers cannot probe
/// for files that belong to other users.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Media not found")]
    NotFound,

    #[error("Storage failure: {0:#}")]
    StorageFailure(#[from] anyhow::Error),

    /// The remote source of a batch could not be read at all.
    #[error("Remote fetch failed: {0:#}")]
    RemoteFetch(anyhow::Error),
}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::StorageFailure(err.into())
    }
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;
