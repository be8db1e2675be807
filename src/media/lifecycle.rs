//! Listing, reading and deleting records that belong to a user.

use super::blob_store::BlobStore;
use super::catalog_store::MediaCatalogStore;
use super::error::{MediaError, MediaResult};
use super::models::{DeleteOutcome, DeleteSummary, DeleteTarget, MediaRecord, MediaRecordSummary};
use super::storage_name::{is_allocated_name, owner_of, storage_name_of_artwork};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::fs::File;
use tracing::{debug, info, warn};

/// An opened blob together with the record it belongs to.
pub struct MediaBlob {
    pub record: MediaRecord,
    pub file: File,
    pub size: u64,
}

pub struct LifecycleManager {
    catalog: Arc<dyn MediaCatalogStore>,
    blobs: Arc<BlobStore>,
}

impl LifecycleManager {
    pub fn new(catalog: Arc<dyn MediaCatalogStore>, blobs: Arc<BlobStore>) -> Self {
        Self { catalog, blobs }
    }

    pub fn list(&self, owner_id: usize) -> MediaResult<Vec<MediaRecordSummary>> {
        let records = self.catalog.list_media(owner_id)?;
        Ok(records.into_iter().map(MediaRecordSummary::from).collect())
    }

    pub fn get(&self, owner_id: usize, storage_name: &str) -> MediaResult<MediaRecord> {
        self.catalog
            .get_media(owner_id, storage_name)?
            .ok_or(MediaError::NotFound)
    }

    /// Opens the blob of an owned record for streaming.
    pub async fn open(&self, owner_id: usize, storage_name: &str) -> MediaResult<MediaBlob> {
        let record = self.get(owner_id, storage_name)?;
        match self.blobs.open(&record.storage_name).await? {
            Some((file, size)) => Ok(MediaBlob { record, file, size }),
            None => {
                warn!("Record {} has no blob on disk", record.storage_name);
                Err(MediaError::NotFound)
            }
        }
    }

    /// Returns the cover image file name and bytes of an owned record.
    pub async fn read_artwork(
        &self,
        owner_id: usize,
        storage_name: &str,
    ) -> MediaResult<(String, Vec<u8>)> {
        let record = self.get(owner_id, storage_name)?;
        let artwork = record.metadata.artwork.ok_or(MediaError::NotFound)?;
        let bytes = self
            .blobs
            .read(&artwork)
            .await?
            .ok_or(MediaError::NotFound)?;
        Ok((artwork, bytes))
    }

    /// Deletes an owned record, then its blob.
    ///
    /// Once the record is gone the file is unreachable, a blob that cannot
    /// be removed is only logged.
    pub async fn delete_one(&self, owner_id: usize, storage_name: &str) -> MediaResult<DeleteOutcome> {
        let record = match self.catalog.delete_media(owner_id, storage_name)? {
            Some(record) => record,
            None => return Ok(DeleteOutcome::NotFound),
        };

        match self.blobs.remove(&record.storage_name).await {
            Ok(true) => {}
            Ok(false) => warn!("Blob {} was already missing", record.storage_name),
            Err(err) => warn!("Orphaned blob {}: {:#}", record.storage_name, err),
        }
        if let Some(artwork) = &record.metadata.artwork {
            if let Err(err) = self.blobs.remove(artwork).await {
                warn!("Orphaned artwork {}: {:#}", artwork, err);
            }
        }

        info!("User {} deleted {}", owner_id, record.storage_name);
        Ok(DeleteOutcome::Deleted)
    }

    /// Deletes every target independently, failures are counted, not raised.
    ///
    /// Names that are not owned by `owner_id` count as neither deleted nor
    /// failed.
    pub async fn delete_many(&self, owner_id: usize, target: DeleteTarget) -> MediaResult<DeleteSummary> {
        let storage_names = match target {
            DeleteTarget::All => self
                .catalog
                .list_media(owner_id)?
                .into_iter()
                .map(|record| record.storage_name)
                .collect(),
            DeleteTarget::StorageNames(names) => {
                let mut seen = HashSet::new();
                names
                    .into_iter()
                    .filter(|name| seen.insert(name.clone()))
                    .collect::<Vec<_>>()
            }
        };

        let mut summary = DeleteSummary::default();
        for storage_name in storage_names {
            match self.delete_one(owner_id, &storage_name).await {
                Ok(DeleteOutcome::Deleted) => summary.deleted_count += 1,
                Ok(DeleteOutcome::NotFound) => debug!("Nothing to delete for {}", storage_name),
                Err(err) => {
                    warn!("Failed to delete {}: {}", storage_name, err);
                    summary.failed_count += 1;
                }
            }
        }
        info!(
            "User {} bulk delete: {} deleted, {} failed",
            owner_id, summary.deleted_count, summary.failed_count
        );
        Ok(summary)
    }

    /// Removes blobs and cover images that have no catalog record.
    ///
    /// Only files named by the storage name allocator are considered, anything
    /// else in the directory is left alone. Only safe while no ingestion is
    /// running, e.g. at startup.
    pub async fn sweep_orphan_blobs(&self) -> Result<usize> {
        let mut removed = 0;
        for name in self.blobs.list_file_names().await? {
            let storage_name = if is_allocated_name(&name) {
                name.clone()
            } else if let Some(storage_name) = storage_name_of_artwork(&name) {
                storage_name
            } else {
                warn!("Leaving unrecognized file {} in the media directory", name);
                continue;
            };
            if self.catalog.contains_storage_name(&storage_name)? {
                continue;
            }
            match owner_of(&name) {
                Some(owner_id) => info!("Removing orphan file {} of user {}", name, owner_id),
                None => info!("Removing orphan file {}", name),
            }
            if self.blobs.remove(&name).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::blob_store::{artwork_file_name, ByteSource};
    use crate::media::catalog_store::MockMediaCatalogStore;
    use crate::media::ingestion::IngestionPipeline;
    use crate::media::models::MediaMetadata;
    use crate::media::sqlite_catalog_store::SqliteMediaCatalogStore;
    use anyhow::anyhow;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct Fixture {
        ingestion: IngestionPipeline,
        lifecycle: LifecycleManager,
        blobs: Arc<BlobStore>,
        _temp_dir: TempDir,
    }

    async fn create_fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let catalog: Arc<dyn MediaCatalogStore> =
            Arc::new(SqliteMediaCatalogStore::new(temp_dir.path().join("media.db")).unwrap());
        let blobs = Arc::new(BlobStore::new(temp_dir.path().join("uploads")));
        blobs.init().await.unwrap();
        Fixture {
            ingestion: IngestionPipeline::new(catalog.clone(), blobs.clone(), 1024 * 1024),
            lifecycle: LifecycleManager::new(catalog, blobs.clone()),
            blobs,
            _temp_dir: temp_dir,
        }
    }

    async fn ingest(fixture: &Fixture, owner_id: usize, name: &str) -> MediaRecord {
        fixture
            .ingestion
            .ingest(owner_id, name, ByteSource::Memory(name.as_bytes().to_vec()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn lists_only_own_records() {
        let fixture = create_fixture().await;
        let mine = ingest(&fixture, 1, "mine.mp3").await;
        ingest(&fixture, 2, "theirs.mp3").await;

        let listed = fixture.lifecycle.list(1).unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].storage_name, mine.storage_name);
        assert!(fixture.lifecycle.list(3).unwrap().is_empty());
    }

    #[tokio::test]
    async fn opens_own_blob() {
        let fixture = create_fixture().await;
        let record = ingest(&fixture, 1, "open me.mp3").await;

        let mut blob = fixture.lifecycle.open(1, &record.storage_name).await.unwrap();
        let mut content = vec![];
        blob.file.read_to_end(&mut content).await.unwrap();

        assert_eq!(content, b"open me.mp3");
        assert_eq!(blob.size, content.len() as u64);
        assert_eq!(blob.record, record);
    }

    #[tokio::test]
    async fn other_users_media_is_not_found() {
        let fixture = create_fixture().await;
        let record = ingest(&fixture, 1, "private.mp3").await;

        assert!(matches!(
            fixture.lifecycle.get(2, &record.storage_name),
            Err(MediaError::NotFound)
        ));
        assert!(matches!(
            fixture.lifecycle.open(2, &record.storage_name).await,
            Err(MediaError::NotFound)
        ));
        assert_eq!(
            fixture.lifecycle.delete_one(2, &record.storage_name).await.unwrap(),
            DeleteOutcome::NotFound
        );
        assert!(fixture.lifecycle.get(1, &record.storage_name).is_ok());
        assert!(fixture.blobs.open(&record.storage_name).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let fixture = create_fixture().await;
        let record = ingest(&fixture, 1, "once.mp3").await;

        let first = fixture.lifecycle.delete_one(1, &record.storage_name).await.unwrap();
        let second = fixture.lifecycle.delete_one(1, &record.storage_name).await.unwrap();

        assert_eq!(first, DeleteOutcome::Deleted);
        assert_eq!(second, DeleteOutcome::NotFound);
        assert!(fixture.blobs.open(&record.storage_name).await.unwrap().is_none());
        assert!(fixture.lifecycle.list(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn deletes_all_own_records_only() {
        let fixture = create_fixture().await;
        for name in ["a.mp3", "b.mp3", "c.mp3"] {
            ingest(&fixture, 1, name).await;
        }
        let theirs = ingest(&fixture, 2, "keep.mp3").await;

        let summary = fixture.lifecycle.delete_many(1, DeleteTarget::All).await.unwrap();

        assert_eq!(
            summary,
            DeleteSummary {
                deleted_count: 3,
                failed_count: 0
            }
        );
        assert!(fixture.lifecycle.list(1).unwrap().is_empty());
        assert_eq!(fixture.lifecycle.list(2).unwrap().len(), 1);
        assert!(fixture.blobs.open(&theirs.storage_name).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bulk_delete_skips_foreign_and_duplicate_names() {
        let fixture = create_fixture().await;
        let mine = ingest(&fixture, 1, "mine.mp3").await;
        let theirs = ingest(&fixture, 2, "theirs.mp3").await;

        let summary = fixture
            .lifecycle
            .delete_many(
                1,
                DeleteTarget::StorageNames(vec![
                    mine.storage_name.clone(),
                    mine.storage_name.clone(),
                    theirs.storage_name.clone(),
                    "1_missing.00000000.mp3".to_string(),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(summary.deleted_count, 1);
        assert_eq!(summary.failed_count, 0);
        assert!(fixture.lifecycle.get(2, &theirs.storage_name).is_ok());
    }

    #[tokio::test]
    async fn bulk_delete_counts_failures_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let blobs = Arc::new(BlobStore::new(temp_dir.path()));
        blobs.init().await.unwrap();
        let mut catalog = MockMediaCatalogStore::new();
        catalog
            .expect_delete_media()
            .returning(|owner_id, storage_name| match storage_name {
                "broken.mp3" => Err(anyhow!("database is locked")),
                _ => Ok(Some(MediaRecord {
                    id: 1,
                    owner_id,
                    storage_name: storage_name.to_string(),
                    original_name: storage_name.to_string(),
                    metadata: MediaMetadata::default(),
                    uploaded_at: 0,
                })),
            });
        let lifecycle = LifecycleManager::new(Arc::new(catalog), blobs);

        let summary = lifecycle
            .delete_many(
                1,
                DeleteTarget::StorageNames(vec![
                    "ok1.mp3".to_string(),
                    "broken.mp3".to_string(),
                    "ok2.mp3".to_string(),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(
            summary,
            DeleteSummary {
                deleted_count: 2,
                failed_count: 1
            }
        );
    }

    #[tokio::test]
    async fn missing_artwork_is_not_found() {
        let fixture = create_fixture().await;
        let record = ingest(&fixture, 1, "bare.mp3").await;

        assert!(matches!(
            fixture.lifecycle.read_artwork(1, &record.storage_name).await,
            Err(MediaError::NotFound)
        ));
    }

    #[tokio::test]
    async fn sweeps_blobs_without_records() {
        let fixture = create_fixture().await;
        let kept = ingest(&fixture, 1, "kept.mp3").await;
        fixture
            .blobs
            .write_new("1_orphan.0000beef.mp3", &ByteSource::Memory(b"x".to_vec()))
            .await
            .unwrap();

        let removed = fixture.lifecycle.sweep_orphan_blobs().await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(
            fixture.blobs.list_audio_names().await.unwrap(),
            vec![kept.storage_name]
        );
    }

    #[tokio::test]
    async fn sweep_collects_orphan_artwork() {
        let fixture = create_fixture().await;
        let kept = ingest(&fixture, 1, "kept.mp3").await;
        let kept_artwork = artwork_file_name(&kept.storage_name, "png");
        let orphan_artwork = artwork_file_name("2_gone.0000beef.mp3", "jpg");
        for name in [&kept_artwork, &orphan_artwork] {
            std::fs::write(fixture.blobs.dir().join(name), b"img").unwrap();
        }

        let removed = fixture.lifecycle.sweep_orphan_blobs().await.unwrap();

        assert_eq!(removed, 1);
        assert!(fixture.blobs.dir().join(&kept_artwork).exists());
        assert!(!fixture.blobs.dir().join(&orphan_artwork).exists());
    }

    #[tokio::test]
    async fn sweep_leaves_foreign_files_alone() {
        let fixture = create_fixture().await;
        let foreign = ["song.mp3", "My Mixtape.mp3", "1_song.mp3", "cover.jpg", "notes.txt"];
        for name in foreign {
            std::fs::write(fixture.blobs.dir().join(name), b"not ours").unwrap();
        }

        let removed = fixture.lifecycle.sweep_orphan_blobs().await.unwrap();

        assert_eq!(removed, 0);
        for name in foreign {
            assert!(fixture.blobs.dir().join(name).exists(), "{} was removed", name);
        }
    }
}
