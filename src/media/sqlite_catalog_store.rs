use super::catalog_store::{InsertOutcome, MediaCatalogStore};
use super::models::{MediaMetadata, MediaRecord, NewMediaRecord};
use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};
use anyhow::{Context, Result};
use rusqlite::{ffi, params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const MEDIA_TABLE_V_0: Table = Table {
    name: "media",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("owner_id", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "storage_name",
            &SqlType::Text,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("original_name", &SqlType::Text, non_null = true),
        sqlite_column!("metadata", &SqlType::Text, non_null = true),
        sqlite_column!("uploaded_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_media_owner_id", "owner_id")],
    unique_constraints: &[],
};

pub const MEDIA_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[MEDIA_TABLE_V_0],
};

const SELECT_MEDIA_COLUMNS: &str =
    "SELECT id, owner_id, storage_name, original_name, metadata, uploaded_at FROM media";

#[derive(Clone)]
pub struct SqliteMediaCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMediaCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = MEDIA_SCHEMA
            .open(db_path.as_ref())
            .context("Failed to open media catalog")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MediaRecord> {
        let storage_name: String = row.get(2)?;
        let metadata_json: String = row.get(4)?;
        let metadata = serde_json::from_str(&metadata_json).unwrap_or_else(|err| {
            warn!("Unreadable metadata for {}: {}", storage_name, err);
            MediaMetadata::default()
        });
        Ok(MediaRecord {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            storage_name,
            original_name: row.get(3)?,
            metadata,
            uploaded_at: row.get(5)?,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock only means another request panicked mid-query,
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MediaCatalogStore for SqliteMediaCatalogStore {
    fn insert_media(&self, record: &NewMediaRecord) -> Result<InsertOutcome> {
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT INTO media (owner_id, storage_name, original_name, metadata, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.owner_id,
                record.storage_name,
                record.original_name,
                metadata_json,
                record.uploaded_at
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                debug!("Storage name {} already taken", record.storage_name);
                return Ok(InsertOutcome::StorageNameTaken);
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to insert media record {}", record.storage_name)
                })
            }
        }

        Ok(InsertOutcome::Inserted(MediaRecord {
            id: conn.last_insert_rowid(),
            owner_id: record.owner_id,
            storage_name: record.storage_name.clone(),
            original_name: record.original_name.clone(),
            metadata: record.metadata.clone(),
            uploaded_at: record.uploaded_at,
        }))
    }

    fn get_media(&self, owner_id: usize, storage_name: &str) -> Result<Option<MediaRecord>> {
        let conn = self.lock();
        conn.query_row(
            &format!("{} WHERE owner_id = ?1 AND storage_name = ?2", SELECT_MEDIA_COLUMNS),
            params![owner_id, storage_name],
            Self::row_to_record,
        )
        .optional()
        .with_context(|| format!("Failed to read media record {}", storage_name))
    }

    fn list_media(&self, owner_id: usize) -> Result<Vec<MediaRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE owner_id = ?1 ORDER BY uploaded_at DESC, id DESC",
            SELECT_MEDIA_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![owner_id], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to list media of user {}", owner_id))?;
        Ok(records)
    }

    fn delete_media(&self, owner_id: usize, storage_name: &str) -> Result<Option<MediaRecord>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let record = tx
            .query_row(
                &format!("{} WHERE owner_id = ?1 AND storage_name = ?2", SELECT_MEDIA_COLUMNS),
                params![owner_id, storage_name],
                Self::row_to_record,
            )
            .optional()?;
        if let Some(record) = &record {
            tx.execute("DELETE FROM media WHERE id = ?1", params![record.id])?;
        }
        tx.commit()
            .with_context(|| format!("Failed to delete media record {}", storage_name))?;
        Ok(record)
    }

    fn contains_storage_name(&self, storage_name: &str) -> Result<bool> {
        let conn = self.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM media WHERE storage_name = ?1",
                params![storage_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
