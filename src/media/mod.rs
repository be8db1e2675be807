//! User-owned media: storage names, blobs, catalog, ingestion and deletion.

mod blob_store;
mod catalog_store;
mod error;
mod ingestion;
mod lifecycle;
mod metadata;
mod models;
mod sqlite_catalog_store;
pub mod storage_name;

pub use blob_store::{artwork_file_name, BlobStore, ByteSource, WriteOutcome};
pub use catalog_store::{InsertOutcome, MediaCatalogStore};
pub use error::{MediaError, MediaResult};
pub use ingestion::{validate_original_name, IngestionPipeline};
pub use lifecycle::{LifecycleManager, MediaBlob};
pub use metadata::extract_metadata;
pub use models::*;
pub use sqlite_catalog_store::{SqliteMediaCatalogStore, MEDIA_SCHEMA};
