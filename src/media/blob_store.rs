//! Flat directory of media blobs, addressed by storage name.

use super::storage_name::AUDIO_EXTENSION;
use anyhow::{bail, Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const ARTWORK_INFIX: &str = ".cover.";

/// Payload of an ingestion, either buffered or already spooled to disk.
#[derive(Clone, Debug)]
pub enum ByteSource {
    Memory(Vec<u8>),
    TempFile(PathBuf),
}

impl ByteSource {
    pub async fn len(&self) -> std::io::Result<u64> {
        match self {
            ByteSource::Memory(bytes) => Ok(bytes.len() as u64),
            ByteSource::TempFile(path) => Ok(fs::metadata(path).await?.len()),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { size: u64 },
    NameTaken,
}

/// Name of the cover image stored next to a blob.
pub fn artwork_file_name(storage_name: &str, extension: &str) -> String {
    let stem = storage_name
        .strip_suffix(AUDIO_EXTENSION)
        .unwrap_or(storage_name);
    format!("{}{}{}", stem, ARTWORK_INFIX, extension)
}

/// Storage names never carry directory components, anything else is
/// rejected before touching the filesystem.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create blob directory {:?}", self.dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_file_name(name) {
            bail!("Invalid blob name {:?}", name);
        }
        Ok(self.dir.join(name))
    }

    /// Writes `source` under `storage_name`, never replacing an existing blob.
    pub async fn write_new(&self, storage_name: &str, source: &ByteSource) -> Result<WriteOutcome> {
        let path = self.path_of(storage_name)?;
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!("Blob {} already exists", storage_name);
                return Ok(WriteOutcome::NameTaken);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to create blob {:?}", path))
            }
        };

        match Self::copy_into(&mut file, source).await {
            Ok(size) => Ok(WriteOutcome::Written { size }),
            Err(err) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(&path).await {
                    warn!("Failed to remove partial blob {:?}: {}", path, remove_err);
                }
                Err(err).with_context(|| format!("Failed to write blob {:?}", path))
            }
        }
    }

    async fn copy_into(file: &mut File, source: &ByteSource) -> std::io::Result<u64> {
        let size = match source {
            ByteSource::Memory(bytes) => {
                file.write_all(bytes).await?;
                bytes.len() as u64
            }
            ByteSource::TempFile(path) => {
                let mut input = File::open(path).await?;
                tokio::io::copy(&mut input, file).await?
            }
        };
        file.sync_all().await?;
        Ok(size)
    }

    /// Opens a blob for reading, `None` if it does not exist.
    pub async fn open(&self, name: &str) -> Result<Option<(File, u64)>> {
        let path = self.path_of(name)?;
        match File::open(&path).await {
            Ok(file) => {
                let size = file.metadata().await?.len();
                Ok(Some((file, size)))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to open blob {:?}", path)),
        }
    }

    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read blob {:?}", path)),
        }
    }

    /// Removes a blob, returning whether it existed.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("Failed to remove blob {:?}", path)),
        }
    }

    /// Names of every regular file in the blob directory.
    pub async fn list_file_names(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list blob directory {:?}", self.dir))?;
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => debug!("Skipping non UTF-8 file name {:?}", name),
            }
        }
        Ok(names)
    }

    /// Audio blob names currently on disk, cover images excluded.
    pub async fn list_audio_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_file_names()
            .await?
            .into_iter()
            .filter(|name| name.ends_with(AUDIO_EXTENSION))
            .collect())
    }
}
