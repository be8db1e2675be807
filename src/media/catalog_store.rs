use super::models::{MediaRecord, NewMediaRecord};
use anyhow::Result;

/// Result of inserting a record whose storage name may already be taken.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome {
    Inserted(MediaRecord),
    /// Another record already uses this storage name, nothing was written.
    StorageNameTaken,
}

/// Durable mapping of (owner, storage name) to the record describing a blob.
///
/// Every read and delete is filtered by owner, a record owned by somebody
/// else is indistinguishable from a missing one.
#[cfg_attr(test, mockall::automock)]
pub trait MediaCatalogStore: Send + Sync {
    /// Inserts a record as a single durable write.
    fn insert_media(&self, record: &NewMediaRecord) -> Result<InsertOutcome>;

    /// Returns the record with the given storage name if it belongs to `owner_id`.
    fn get_media(&self, owner_id: usize, storage_name: &str) -> Result<Option<MediaRecord>>;

    /// Returns all records of `owner_id`, most recent upload first.
    fn list_media(&self, owner_id: usize) -> Result<Vec<MediaRecord>>;

    /// Deletes the record if it belongs to `owner_id`, returning what was deleted.
    fn delete_media(&self, owner_id: usize, storage_name: &str) -> Result<Option<MediaRecord>>;

    /// Whether any user owns a record with this storage name.
    fn contains_storage_name(&self, storage_name: &str) -> Result<bool>;
}
