//! Turns an uploaded payload into a stored blob plus its catalog record.

use super::blob_store::{BlobStore, ByteSource, WriteOutcome};
use super::catalog_store::{InsertOutcome, MediaCatalogStore};
use super::error::{MediaError, MediaResult};
use super::metadata::extract_metadata;
use super::models::{MediaMetadata, MediaRecord, NewMediaRecord};
use super::storage_name::{allocate_storage_name, AUDIO_EXTENSION};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Storage names are random, a handful of attempts is plenty.
const MAX_ALLOCATION_ATTEMPTS: usize = 4;

pub struct IngestionPipeline {
    catalog: Arc<dyn MediaCatalogStore>,
    blobs: Arc<BlobStore>,
    max_size_bytes: u64,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Only names ending with the audio extension are accepted, case sensitive.
pub fn validate_original_name(original_name: &str) -> MediaResult<()> {
    if original_name.trim().is_empty() {
        return Err(MediaError::InvalidInput("missing file name".to_string()));
    }
    if !original_name.ends_with(AUDIO_EXTENSION) {
        return Err(MediaError::InvalidInput(format!(
            "{:?} is not an {} file",
            original_name, AUDIO_EXTENSION
        )));
    }
    Ok(())
}

impl IngestionPipeline {
    pub fn new(catalog: Arc<dyn MediaCatalogStore>, blobs: Arc<BlobStore>, max_size_bytes: u64) -> Self {
        Self {
            catalog,
            blobs,
            max_size_bytes,
        }
    }

    /// Stores `source` for `owner_id` and records it in the catalog.
    ///
    /// On success both the blob and its record exist. On failure neither
    /// does, a blob written before a failed insert is removed again.
    pub async fn ingest(
        &self,
        owner_id: usize,
        original_name: &str,
        source: ByteSource,
    ) -> MediaResult<MediaRecord> {
        validate_original_name(original_name)?;
        let size = source.len().await?;
        if size == 0 {
            return Err(MediaError::InvalidInput("empty payload".to_string()));
        }
        if size > self.max_size_bytes {
            return Err(MediaError::InvalidInput(format!(
                "payload of {} bytes exceeds the limit of {} bytes",
                size, self.max_size_bytes
            )));
        }

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let storage_name = allocate_storage_name(owner_id, original_name);
            match self.blobs.write_new(&storage_name, &source).await? {
                WriteOutcome::Written { size } => {
                    debug!("Wrote blob {} ({} bytes)", storage_name, size)
                }
                WriteOutcome::NameTaken => {
                    warn!("Storage name collision on attempt {}: {}", attempt, storage_name);
                    continue;
                }
            }

            let metadata = self.extract_metadata(&storage_name, original_name).await;
            let new_record = NewMediaRecord {
                owner_id,
                storage_name: storage_name.clone(),
                original_name: original_name.to_string(),
                metadata,
                uploaded_at: unix_now(),
            };

            match self.catalog.insert_media(&new_record) {
                Ok(InsertOutcome::Inserted(record)) => {
                    info!(
                        "User {} ingested {:?} as {}",
                        owner_id, original_name, record.storage_name
                    );
                    return Ok(record);
                }
                Ok(InsertOutcome::StorageNameTaken) => {
                    warn!("Catalog already holds {}, retrying", storage_name);
                    self.discard(&storage_name, &new_record.metadata).await;
                }
                Err(err) => {
                    self.discard(&storage_name, &new_record.metadata).await;
                    return Err(MediaError::StorageFailure(err));
                }
            }
        }

        Err(MediaError::StorageFailure(anyhow!(
            "no free storage name for {:?} after {} attempts",
            original_name,
            MAX_ALLOCATION_ATTEMPTS
        )))
    }

    async fn extract_metadata(&self, storage_name: &str, original_name: &str) -> MediaMetadata {
        let blob_path = match self.blobs.path_of(storage_name) {
            Ok(path) => path,
            Err(err) => {
                warn!("{:#}", err);
                return MediaMetadata::default();
            }
        };
        let display_name = original_name.to_string();
        match tokio::task::spawn_blocking(move || extract_metadata(&blob_path, &display_name)).await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("Metadata extraction of {} did not complete: {}", storage_name, err);
                MediaMetadata::default()
            }
        }
    }

    /// Removes a blob whose record never made it into the catalog.
    async fn discard(&self, storage_name: &str, metadata: &MediaMetadata) {
        if let Err(err) = self.blobs.remove(storage_name).await {
            error!("Failed to remove uncataloged blob {}: {:#}", storage_name, err);
        }
        if let Some(artwork) = &metadata.artwork {
            if let Err(err) = self.blobs.remove(artwork).await {
                error!("Failed to remove uncataloged artwork {}: {:#}", artwork, err);
            }
        }
    }
}
