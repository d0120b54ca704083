//! Database layer for vault storage.
//!
//! This module handles all redb operations including:
//! - Main record storage (RecordId → VersionedValue)
//! - Ordered indexes for pagination (live) and retention pruning (deleted)
//! - Metadata storage (JSON strings)
//! - Schema upgrades from older store layouts

use crate::core::db::error::DatabaseError;
use crate::core::db::index_table::IndexTable;
use crate::types::metadata::{MaintenanceMetadata, SchemaMetadata};
use crate::types::value::versioned_value::VersionedValue;
use crate::types::value::versioned_value::latest_value::{Attachment, Value};
use crate::types::{Config, IndexKey, RecordId, Timestamp};
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum DatabaseError {
        #[error("Database error: {0}")]
        Redb(#[from] redb::DatabaseError),

        #[error("Table error: {0}")]
        TableError(#[from] redb::TableError),

        #[error("Storage error: {0}")]
        StorageError(#[from] redb::StorageError),

        #[error("Transaction error: {0}")]
        TransactionError(#[from] redb::TransactionError),

        #[error("Commit error: {0}")]
        CommitError(#[from] redb::CommitError),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Metadata encoding error: {0}")]
        Metadata(#[from] serde_json::Error),

        #[error("Record not found")]
        NotFound,

        #[error("Record is deleted")]
        Deleted,

        #[error("Record is not deleted")]
        NotDeleted,

        #[error("Record already exists")]
        AlreadyExists,

        #[error("Attachment not found: {0}")]
        AttachmentNotFound(String),

        #[error("Corrupt store: {0}")]
        Corrupt(String),
    }
}

mod index_table;
pub(crate) mod migration;

pub use migration::UpgradeReport;

/// Main table: RecordId → VersionedValue
pub(crate) const MAIN_TABLE: TableDefinition<RecordId, VersionedValue> =
    TableDefinition::new("records");

/// Metadata table: &str → JSON string
pub(crate) const METADATA_TABLE: TableDefinition<&str, &str> = TableDefinition::new("metadata");

const METADATA_KEY_MAINTENANCE: &str = "maintenance";
const METADATA_KEY_SCHEMA: &str = "schema";

/// Live records by `updated_at`.
const LIVE_INDEX: IndexTable = IndexTable::new("idx_live");

/// Soft-deleted records by `deleted_at`.
const DELETED_INDEX: IndexTable = IndexTable::new("idx_deleted");

/// The main database struct wrapping redb.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Creates or opens the store file for the configured namespace.
    ///
    /// Tables are created by [`Database::upgrade`], which must run before any
    /// other operation.
    pub fn new(config: &Config) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(&config.base_path)?;

        let db = redb::Database::create(config.db_path())?;

        Ok(Self { db })
    }

    fn init_tables(txn: &redb::WriteTransaction) -> Result<(), DatabaseError> {
        let _ = txn.open_table(MAIN_TABLE)?;
        let _ = txn.open_table(METADATA_TABLE)?;
        LIVE_INDEX.init(txn)?;
        DELETED_INDEX.init(txn)?;
        Ok(())
    }
}

/// Create operations.
impl Database {
    /// Inserts a new record.
    ///
    /// Returns `Err(AlreadyExists)` if the id is taken.
    pub fn insert(&mut self, id: &RecordId, value: &Value) -> Result<(), DatabaseError> {
        let write_txn = self.db.begin_write()?;

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            if main_table.get(id)?.is_some() {
                return Err(DatabaseError::AlreadyExists);
            }

            Self::index(&write_txn, id, value)?;
            main_table.insert(id, &VersionedValue::from(value.clone()))?;
        }

        write_txn.commit()?;
        Ok(())
    }

    /// Inserts or replaces a record as-is, keeping the indexes in step.
    ///
    /// Used when applying records received from a sync peer.
    pub fn put(&mut self, id: &RecordId, value: &Value) -> Result<(), DatabaseError> {
        let write_txn = self.db.begin_write()?;

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            let previous = main_table.get(id)?.map(|g| g.value().into_latest());
            if let Some(previous) = previous {
                Self::unindex(&write_txn, id, &previous)?;
            }

            Self::index(&write_txn, id, value)?;
            main_table.insert(id, &VersionedValue::from(value.clone()))?;
        }

        write_txn.commit()?;
        Ok(())
    }
}

/// Read operations.
impl Database {
    /// Retrieves a record by id, deleted or not.
    pub fn get(&self, id: &RecordId) -> Result<Option<Value>, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MAIN_TABLE)?;

        match table.get(id)? {
            None => Ok(None),
            Some(guard) => Ok(Some(guard.value().into_latest())),
        }
    }

    /// Live records ordered by `updated_at`, newest first.
    pub fn live_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(RecordId, Value)>, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let ids = LIVE_INDEX.newest_first(&read_txn, offset, limit)?;
        let table = read_txn.open_table(MAIN_TABLE)?;

        let mut page = Vec::with_capacity(ids.len());
        for id in ids {
            let value = table
                .get(&id)?
                .map(|g| g.value().into_latest())
                .ok_or_else(|| DatabaseError::Corrupt(format!("indexed record {id} missing")))?;
            page.push((id, value));
        }
        Ok(page)
    }

    /// Every live record, newest first.
    pub fn live_records(&self) -> Result<Vec<(RecordId, Value)>, DatabaseError> {
        self.live_page(0, usize::MAX)
    }

    pub fn live_count(&self) -> Result<u64, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        LIVE_INDEX.len(&read_txn)
    }

    /// Every stored record including soft-deleted ones, in id order.
    pub fn all_records(&self) -> Result<Vec<(RecordId, Value)>, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MAIN_TABLE)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (id, value) = entry?;
            records.push((id.value(), value.value().into_latest()));
        }
        Ok(records)
    }

    /// Ids of soft-deleted records, oldest deletion first.
    pub fn deleted_ids(&self) -> Result<Vec<RecordId>, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        DELETED_INDEX.all_keys(&read_txn)
    }
}

/// Update operations.
impl Database {
    /// Replaces the encrypted content and bumps `updated_at`.
    ///
    /// Returns `Err(NotFound)` if the id doesn't exist.
    /// Returns `Err(Deleted)` if the record is soft-deleted.
    pub fn update_content(
        &mut self,
        id: &RecordId,
        content: String,
        now: Timestamp,
    ) -> Result<Value, DatabaseError> {
        self.modify_live(id, now, |value| {
            value.content = content;
            Ok(())
        })
    }

    /// Appends attachment metadata and bumps `updated_at`.
    pub fn add_attachments(
        &mut self,
        id: &RecordId,
        attachments: Vec<Attachment>,
        now: Timestamp,
    ) -> Result<Value, DatabaseError> {
        self.modify_live(id, now, |value| {
            value.attachments.extend(attachments);
            Ok(())
        })
    }

    /// Removes attachment metadata by attachment id and bumps `updated_at`.
    ///
    /// Returns `Err(AttachmentNotFound)` if the attachment doesn't exist.
    pub fn remove_attachment(
        &mut self,
        id: &RecordId,
        attachment_id: &str,
        now: Timestamp,
    ) -> Result<Value, DatabaseError> {
        self.modify_live(id, now, |value| {
            let pos = value
                .attachments
                .iter()
                .position(|a| a.id == attachment_id)
                .ok_or_else(|| DatabaseError::AttachmentNotFound(attachment_id.to_string()))?;
            value.attachments.remove(pos);
            Ok(())
        })
    }

    /// Loads a live record, applies `f`, advances `updated_at` and moves the
    /// live index entry, all in one transaction.
    fn modify_live(
        &mut self,
        id: &RecordId,
        now: Timestamp,
        f: impl FnOnce(&mut Value) -> Result<(), DatabaseError>,
    ) -> Result<Value, DatabaseError> {
        let write_txn = self.db.begin_write()?;

        let mut value;

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            value = main_table
                .get(id)?
                .map(|g| g.value().into_latest())
                .ok_or(DatabaseError::NotFound)?;

            if value.is_deleted() {
                return Err(DatabaseError::Deleted);
            }

            Self::unindex(&write_txn, id, &value)?;
            f(&mut value)?;
            value.updated_at = Timestamp::advance(value.updated_at, now);
            Self::index(&write_txn, id, &value)?;

            main_table.insert(id, &VersionedValue::from(value.clone()))?;
        }

        write_txn.commit()?;
        Ok(value)
    }
}

/// Delete operations.
impl Database {
    /// Marks a record deleted: `deleted_at = updated_at = now` (advanced past
    /// the previous `updated_at`). Its attachment list is cleared.
    pub fn soft_delete(&mut self, id: &RecordId, now: Timestamp) -> Result<Value, DatabaseError> {
        let write_txn = self.db.begin_write()?;

        let mut value;

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            value = main_table
                .get(id)?
                .map(|g| g.value().into_latest())
                .ok_or(DatabaseError::NotFound)?;

            if value.is_deleted() {
                return Err(DatabaseError::Deleted);
            }

            Self::unindex(&write_txn, id, &value)?;

            let at = Timestamp::advance(value.updated_at, now);
            value.updated_at = at;
            value.deleted_at = Some(at);
            value.attachments.clear();

            Self::index(&write_txn, id, &value)?;
            main_table.insert(id, &VersionedValue::from(value.clone()))?;
        }

        write_txn.commit()?;
        Ok(value)
    }

    /// Undoes a soft delete.
    ///
    /// Returns `Err(NotDeleted)` if the record is live.
    pub fn restore(&mut self, id: &RecordId, now: Timestamp) -> Result<Value, DatabaseError> {
        let write_txn = self.db.begin_write()?;

        let mut value;

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            value = main_table
                .get(id)?
                .map(|g| g.value().into_latest())
                .ok_or(DatabaseError::NotFound)?;

            if !value.is_deleted() {
                return Err(DatabaseError::NotDeleted);
            }

            Self::unindex(&write_txn, id, &value)?;

            value.updated_at = Timestamp::advance(value.updated_at, now);
            value.deleted_at = None;

            Self::index(&write_txn, id, &value)?;
            main_table.insert(id, &VersionedValue::from(value.clone()))?;
        }

        write_txn.commit()?;
        Ok(value)
    }

    /// Permanently deletes a record.
    pub fn purge(&mut self, id: &RecordId) -> Result<Value, DatabaseError> {
        let write_txn = self.db.begin_write()?;

        let value;

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            value = main_table
                .remove(id)?
                .map(|g| g.value().into_latest())
                .ok_or(DatabaseError::NotFound)?;

            Self::unindex(&write_txn, id, &value)?;
        }

        write_txn.commit()?;
        Ok(value)
    }
}

/// Maintenance operations.
impl Database {
    /// Permanently removes records soft-deleted at or before `now - retention`
    /// and records `now` as the last maintenance run.
    ///
    /// Returns the pruned records so the caller can drop their payload files.
    pub fn prune(
        &mut self,
        now: Timestamp,
        retention: Duration,
    ) -> Result<Vec<(RecordId, Value)>, DatabaseError> {
        let cutoff = now.saturating_sub(retention);
        let expired = {
            let read_txn = self.db.begin_read()?;
            DELETED_INDEX.keys_up_to(&read_txn, cutoff)?
        };

        let metadata = serde_json::to_string(&MaintenanceMetadata {
            last_maintenance_run: Some(now),
        })?;

        let write_txn = self.db.begin_write()?;
        let mut pruned = Vec::with_capacity(expired.len());

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            for id in expired {
                let Some(value) = main_table
                    .remove(&id)?
                    .map(|guard| guard.value().into_latest())
                else {
                    continue;
                };
                Self::unindex(&write_txn, &id, &value)?;
                pruned.push((id, value));
            }

            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            meta_table.insert(METADATA_KEY_MAINTENANCE, metadata.as_str())?;
        }

        write_txn.commit()?;
        Ok(pruned)
    }
}

/// Index helpers.
impl Database {
    fn index_entry(id: &RecordId, value: &Value) -> (&'static IndexTable, IndexKey) {
        match value.deleted_at {
            Some(deleted_at) => (
                &DELETED_INDEX,
                IndexKey {
                    timestamp: deleted_at,
                    id: id.clone(),
                },
            ),
            None => (
                &LIVE_INDEX,
                IndexKey {
                    timestamp: value.updated_at,
                    id: id.clone(),
                },
            ),
        }
    }

    pub(crate) fn index(
        txn: &redb::WriteTransaction,
        id: &RecordId,
        value: &Value,
    ) -> Result<(), DatabaseError> {
        let (table, key) = Self::index_entry(id, value);
        table.insert(txn, &key)
    }

    fn unindex(
        txn: &redb::WriteTransaction,
        id: &RecordId,
        value: &Value,
    ) -> Result<(), DatabaseError> {
        let (table, key) = Self::index_entry(id, value);
        table.remove(txn, &key)?;
        Ok(())
    }
}

/// Metadata operations.
impl Database {
    fn get_metadata<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(METADATA_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match table.get(key)? {
            None => Ok(None),
            Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        }
    }

    fn set_metadata_in<T: Serialize>(
        txn: &redb::WriteTransaction,
        key: &str,
        metadata: &T,
    ) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(metadata)?;
        let mut table = txn.open_table(METADATA_TABLE)?;
        table.insert(key, json.as_str())?;
        Ok(())
    }

    pub fn last_maintenance_run(&self) -> Result<Option<Timestamp>, DatabaseError> {
        Ok(self
            .get_metadata::<MaintenanceMetadata>(METADATA_KEY_MAINTENANCE)?
            .and_then(|m| m.last_maintenance_run))
    }

    /// Returns true if maintenance should run (never run or interval elapsed).
    ///
    /// A recorded run in the future (clock moved backwards) counts as due.
    pub fn should_run_maintenance(
        &self,
        now: Timestamp,
        interval: Duration,
    ) -> Result<bool, DatabaseError> {
        Ok(match self.last_maintenance_run()? {
            None => true,
            Some(last) => now.since(last).is_none_or(|elapsed| elapsed >= interval),
        })
    }

    /// Stored schema version, `None` for a store that predates version tracking.
    pub fn schema_version(&self) -> Result<Option<u32>, DatabaseError> {
        Ok(self
            .get_metadata::<SchemaMetadata>(METADATA_KEY_SCHEMA)?
            .map(|m| m.version))
    }

    pub(crate) fn set_schema_version_in(
        txn: &redb::WriteTransaction,
        version: u32,
    ) -> Result<(), DatabaseError> {
        Self::set_metadata_in(txn, METADATA_KEY_SCHEMA, &SchemaMetadata { version })
    }
}
