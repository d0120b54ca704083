//! Vault storage combining the record database, attachment files and the
//! cipher codec.
//!
//! Record content is encrypted before it reaches the database and decrypted on
//! the way out. A record that cannot be decrypted with the session key is
//! reported with `content: None` by single-record reads and silently skipped
//! by filtered page reads.

use crate::core::db::Database;
use crate::core::db::error::DatabaseError;
use crate::core::file_storage::FileStorage;
use crate::crypto::{CipherCodec, VaultIdentity};
use crate::error::ValidationError;
use crate::parser::{self, NoteType};
use crate::types::value::versioned_value::latest_value;
use crate::types::{
    AttachmentPayload, Config, ExportedRecord, Fields, NewAttachment, Payload, Record, RecordId,
    Timestamp,
};
use error::VaultError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) mod db;
pub(crate) mod file_storage;
pub mod maintenance;

pub use db::UpgradeReport;
pub use db::migration::CURRENT_SCHEMA;

pub mod error {
    use crate::core::db::error::DatabaseError;
    use crate::core::file_storage::error::FileStorageError;
    use crate::crypto::CodecError;
    use crate::error::ValidationError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum VaultError {
        /// The id is absent, or refers to a record in the wrong lifecycle state
        /// for the operation (e.g. updating a soft-deleted record).
        #[error("Record not found")]
        NotFound,

        #[error("Validation error: {0}")]
        Validation(#[from] ValidationError),

        #[error("Database error: {0}")]
        Database(#[from] DatabaseError),

        #[error("File storage error: {0}")]
        FileStorage(#[from] FileStorageError),

        #[error("Codec error: {0}")]
        Codec(#[from] CodecError),

        /// The store could not be brought to the current schema. The store is
        /// left at its previous version and must not be used.
        #[error("Schema upgrade failed: {0}")]
        Migration(String),
    }
}

/// Largest accepted attachment payload, in bytes.
pub const MAX_ATTACHMENT_SIZE: u64 = 10 * 1024 * 1024;

/// Id derivation retries before giving up on a colliding insert.
const MAX_ID_ATTEMPTS: u32 = 16;

fn record_to_path(id: &RecordId) -> PathBuf {
    let hash = blake3::hash(id.as_str().as_bytes());
    PathBuf::from(hash.to_hex().as_str())
}

/// Lifecycle-state mismatches surface to callers as `NotFound`.
fn lookup_error(err: DatabaseError) -> VaultError {
    match err {
        DatabaseError::NotFound
        | DatabaseError::Deleted
        | DatabaseError::NotDeleted
        | DatabaseError::AttachmentNotFound(_) => VaultError::NotFound,
        other => VaultError::Database(other),
    }
}

/// Page request for [`VaultCore::fetch_page`]. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: usize,
    pub page_size: usize,
    pub search: Option<String>,
    pub note_type: Option<NoteType>,
}

impl PageQuery {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            search: None,
            note_type: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_type(mut self, note_type: NoteType) -> Self {
        self.note_type = Some(note_type);
        self
    }

    /// Whether the page needs every record decrypted. Blank searches don't.
    pub fn is_filtered(&self) -> bool {
        self.note_type.is_some() || self.search.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.page == 0 {
            return Err(ValidationError::InvalidPage("page numbers start at 1".into()));
        }
        if self.page_size == 0 {
            return Err(ValidationError::InvalidPage("page size must be positive".into()));
        }
        Ok(())
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

pub struct VaultCore {
    base_path: PathBuf,
    db: Database,
    file: FileStorage,
    codec: CipherCodec,
    upgrade: UpgradeReport,
}

impl VaultCore {
    /// Opens (creating if needed) the vault for `identity` and brings its
    /// store to the current schema.
    pub fn open(config: Config, identity: &VaultIdentity) -> Result<Self, VaultError> {
        Self::open_with_codec(config, CipherCodec::new(identity))
    }

    pub fn open_with_codec(config: Config, codec: CipherCodec) -> Result<Self, VaultError> {
        let base_path = config.base_path.clone();
        let file = FileStorage {
            blobs_path: config.blobs_path(),
        };

        let mut db = Database::new(&config)?;
        let upgrade = db
            .upgrade(&codec)
            .map_err(|e| VaultError::Migration(e.to_string()))?;

        debug!(namespace = %config.namespace, schema = upgrade.to_version, "vault opened");

        Ok(Self {
            base_path,
            db,
            file,
            codec,
            upgrade,
        })
    }

    /// Returns the base data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.base_path
    }

    pub fn codec(&self) -> &CipherCodec {
        &self.codec
    }

    /// What the schema upgrade did when this vault was opened.
    pub fn upgrade_report(&self) -> UpgradeReport {
        self.upgrade
    }

    fn decrypt_record(&self, id: RecordId, value: latest_value::Value) -> Record {
        let content = self.codec.decrypt_raw(&value.content);
        if content.is_none() {
            warn!(%id, "record cannot be decrypted with the session key");
        }
        Record::from_latest_value(id, value, content)
    }
}

/// Read operations.
impl VaultCore {
    /// Returns `None` for missing and soft-deleted records alike.
    pub fn get(&self, id: &RecordId) -> Result<Option<Record>, VaultError> {
        let value = self.db.get(id)?.filter(|v| !v.is_deleted());
        Ok(value.map(|v| self.decrypt_record(id.clone(), v)))
    }

    /// Live records, newest `updated_at` first.
    ///
    /// Without a search or type filter the page is read straight from the
    /// live index. With one, every live record is decrypted and parsed first;
    /// records that cannot be decrypted are left out.
    pub fn fetch_page(&self, query: &PageQuery) -> Result<Vec<Record>, VaultError> {
        query.validate()?;

        if !query.is_filtered() {
            let page = self.db.live_page(query.offset(), query.page_size)?;
            return Ok(page
                .into_iter()
                .map(|(id, value)| self.decrypt_record(id, value))
                .collect());
        }

        let search = query.search.as_deref().map(str::trim).unwrap_or_default();
        let mut matched = Vec::new();

        for (id, value) in self.db.live_records()? {
            let Some(payload) = self.codec.decrypt(&value.content) else {
                warn!(%id, "skipping undecryptable record in filtered page");
                continue;
            };
            if !payload.matches(search) {
                continue;
            }
            if let Some(wanted) = query.note_type {
                let is_type = payload
                    .as_raw()
                    .is_some_and(|raw| parser::parse(raw).note_type == wanted);
                if !is_type {
                    continue;
                }
            }
            matched.push(Record::from_latest_value(id, value, payload.into_raw()));
        }

        Ok(matched
            .into_iter()
            .skip(query.offset())
            .take(query.page_size)
            .collect())
    }

    pub fn live_count(&self) -> Result<u64, VaultError> {
        Ok(self.db.live_count()?)
    }
}

/// Content operations.
impl VaultCore {
    /// Stores a new note and returns its id.
    pub fn add(&mut self, raw: &str, now: Timestamp) -> Result<RecordId, VaultError> {
        let content = self.codec.encrypt(&Payload::Raw(raw.to_string()))?;

        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = RecordId::derive(&content, now.as_millis(), attempt);
            let value = latest_value::Value {
                content: content.clone(),
                updated_at: now,
                deleted_at: None,
                attachments: vec![],
            };

            match self.db.insert(&id, &value) {
                Ok(()) => {
                    debug!(%id, "record added");
                    return Ok(id);
                }
                Err(DatabaseError::AlreadyExists) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DatabaseError::AlreadyExists.into())
    }

    /// Renders structured fields as tagged text and stores the result.
    pub fn add_structured(
        &mut self,
        note_type: NoteType,
        fields: &Fields,
        now: Timestamp,
    ) -> Result<RecordId, VaultError> {
        self.add(&parser::serialize(note_type, fields), now)
    }

    /// Replaces the content of a live record.
    ///
    /// Returns `Err(NotFound)` for missing and soft-deleted records.
    pub fn update(&mut self, id: &RecordId, raw: &str, now: Timestamp) -> Result<Record, VaultError> {
        let content = self.codec.encrypt(&Payload::Raw(raw.to_string()))?;
        let value = self
            .db
            .update_content(id, content, now)
            .map_err(lookup_error)?;

        debug!(%id, "record updated");
        Ok(Record::from_latest_value(id.clone(), value, Some(raw.to_string())))
    }
}

/// Lifecycle operations.
impl VaultCore {
    /// Hides a record from reads and deletes its attachments. A restored
    /// record comes back without them.
    pub fn soft_delete(&mut self, id: &RecordId, now: Timestamp) -> Result<(), VaultError> {
        self.db.soft_delete(id, now).map_err(lookup_error)?;
        self.file.remove_all(&record_to_path(id))?;
        debug!(%id, "record soft-deleted");
        Ok(())
    }

    /// Undoes a soft delete. Returns `Err(NotFound)` unless the record is
    /// currently soft-deleted.
    pub fn restore(&mut self, id: &RecordId, now: Timestamp) -> Result<Record, VaultError> {
        let value = self.db.restore(id, now).map_err(lookup_error)?;
        debug!(%id, "record restored");
        Ok(self.decrypt_record(id.clone(), value))
    }

    /// Permanently deletes a record and its attachment payloads.
    pub fn purge(&mut self, id: &RecordId) -> Result<(), VaultError> {
        self.db.purge(id).map_err(lookup_error)?;
        self.file.remove_all(&record_to_path(id))?;
        debug!(%id, "record purged");
        Ok(())
    }

    /// Ids of soft-deleted records, oldest deletion first.
    pub fn deleted_ids(&self) -> Result<Vec<RecordId>, VaultError> {
        Ok(self.db.deleted_ids()?)
    }
}

/// Attachment operations.
impl VaultCore {
    /// Attaches files to a live record and returns the new attachment ids.
    ///
    /// Every size is checked before anything is written.
    pub fn add_attachments(
        &mut self,
        id: &RecordId,
        files: Vec<NewAttachment>,
        now: Timestamp,
    ) -> Result<Vec<String>, VaultError> {
        for file in &files {
            let size = file.bytes.len() as u64;
            if size > MAX_ATTACHMENT_SIZE {
                return Err(ValidationError::AttachmentTooLarge {
                    name: file.name.clone(),
                    size,
                    max: MAX_ATTACHMENT_SIZE,
                }
                .into());
            }
        }

        if self.get_live_value(id)?.is_none() {
            return Err(VaultError::NotFound);
        }

        let record_hash = record_to_path(id);
        let mut attachments = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            let attachment_id = Self::attachment_id(id, file, now, index);
            let written = self
                .codec
                .encrypt_bytes(&file.bytes)
                .map_err(VaultError::from)
                .and_then(|sealed| {
                    Ok(self
                        .file
                        .write_attachment(&record_hash, &attachment_id, &sealed)?)
                });

            if let Err(e) = written {
                self.discard_files(&record_hash, &attachments);
                return Err(e);
            }

            attachments.push(latest_value::Attachment {
                id: attachment_id,
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                size: file.bytes.len() as u64,
                uploaded_at: now,
            });
        }

        let ids: Vec<String> = attachments.iter().map(|a| a.id.clone()).collect();

        if let Err(e) = self.db.add_attachments(id, attachments.clone(), now) {
            self.discard_files(&record_hash, &attachments);
            return Err(lookup_error(e));
        }

        debug!(%id, count = ids.len(), "attachments added");
        Ok(ids)
    }

    pub fn remove_attachment(
        &mut self,
        id: &RecordId,
        attachment_id: &str,
        now: Timestamp,
    ) -> Result<(), VaultError> {
        self.db
            .remove_attachment(id, attachment_id, now)
            .map_err(lookup_error)?;
        self.file
            .remove_attachment(&record_to_path(id), attachment_id)?;
        debug!(%id, attachment_id, "attachment removed");
        Ok(())
    }

    /// Decrypted payload of an attachment of a live record.
    ///
    /// Returns `None` if the record or attachment is unknown, the payload file
    /// is missing, or it cannot be decrypted.
    pub fn attachment_payload(
        &self,
        id: &RecordId,
        attachment_id: &str,
    ) -> Result<Option<Vec<u8>>, VaultError> {
        let Some(value) = self.get_live_value(id)? else {
            return Ok(None);
        };
        if !value.attachments.iter().any(|a| a.id == attachment_id) {
            return Ok(None);
        }

        let Some(sealed) = self.stored_payload(id, attachment_id)? else {
            warn!(%id, attachment_id, "attachment payload file is missing");
            return Ok(None);
        };

        let bytes = self.codec.decrypt_bytes(&sealed);
        if bytes.is_none() {
            warn!(%id, attachment_id, "attachment cannot be decrypted with the session key");
        }
        Ok(bytes)
    }

    fn attachment_id(id: &RecordId, file: &NewAttachment, now: Timestamp, index: usize) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(id.as_str().as_bytes());
        hasher.update(file.name.as_bytes());
        hasher.update(&now.as_millis().to_be_bytes());
        hasher.update(&(index as u64).to_be_bytes());
        hasher.update(&file.bytes);
        hasher.finalize().to_hex()[..32].to_string()
    }

    fn discard_files(&self, record_hash: &Path, attachments: &[latest_value::Attachment]) {
        for attachment in attachments {
            if let Err(e) = self.file.remove_attachment(record_hash, &attachment.id) {
                warn!(attachment_id = %attachment.id, error = %e, "failed to discard attachment file");
            }
        }
    }

    fn get_live_value(&self, id: &RecordId) -> Result<Option<latest_value::Value>, VaultError> {
        Ok(self.db.get(id)?.filter(|v| !v.is_deleted()))
    }
}

/// Export and sync support.
impl VaultCore {
    /// Every stored record, soft-deleted ones included, with content and
    /// attachment payloads still encrypted.
    pub fn export(&self) -> Result<Vec<ExportedRecord>, VaultError> {
        let mut exported = Vec::new();

        for (id, value) in self.db.all_records()? {
            let mut attachment_payloads = Vec::new();
            for attachment in &value.attachments {
                if let Some(bytes) = self.stored_payload(&id, &attachment.id)? {
                    attachment_payloads.push(AttachmentPayload {
                        attachment_id: attachment.id.clone(),
                        bytes,
                    });
                }
            }

            exported.push(ExportedRecord {
                id: id.into_inner(),
                content: value.content,
                updated_at: value.updated_at,
                deleted_at: value.deleted_at,
                attachments: value.attachments.into_iter().map(Into::into).collect(),
                attachment_payloads,
            });
        }

        Ok(exported)
    }

    /// Encrypted payload bytes as stored on disk.
    pub(crate) fn stored_payload(
        &self,
        id: &RecordId,
        attachment_id: &str,
    ) -> Result<Option<Vec<u8>>, VaultError> {
        Ok(self.file.read_attachment(&record_to_path(id), attachment_id)?)
    }

    /// Writes a record resolved by a merge: payload files first, then the
    /// record itself in a single transaction. A tombstone drops the record's
    /// files instead.
    pub(crate) fn apply_merged(
        &mut self,
        id: &RecordId,
        value: latest_value::Value,
        payloads: &[(String, Vec<u8>)],
    ) -> Result<(), VaultError> {
        let record_hash = record_to_path(id);
        if value.is_deleted() {
            self.file.remove_all(&record_hash)?;
        }
        for (attachment_id, bytes) in payloads {
            self.file.write_attachment(&record_hash, attachment_id, bytes)?;
        }
        self.db.put(id, &value)?;
        Ok(())
    }
}

/// Cache operations.
impl VaultCore {
    pub fn clear_cache(&self) {
        self.codec.clear_cache();
    }

    pub fn cache_len(&self) -> usize {
        self.codec.cache_len()
    }
}

/// Maintenance operations.
impl VaultCore {
    pub fn should_run_maintenance(
        &self,
        now: Timestamp,
        interval: Duration,
    ) -> Result<bool, VaultError> {
        Ok(self.db.should_run_maintenance(now, interval)?)
    }

    pub fn last_maintenance_run(&self) -> Result<Option<Timestamp>, VaultError> {
        Ok(self.db.last_maintenance_run()?)
    }

    /// Prunes records soft-deleted longer than `retention`, removes their
    /// payload files and any orphaned blob directories, then clears the
    /// decrypt cache. Records `now` as the last maintenance run.
    pub fn maintenance(
        &mut self,
        now: Timestamp,
        retention: Duration,
    ) -> Result<maintenance::MaintenanceOutcome, VaultError> {
        let pruned = self.db.prune(now, retention)?;

        for (id, _) in &pruned {
            self.file.remove_all(&record_to_path(id))?;
        }

        // Clean up orphan blobs (directories without database entries)
        let valid_hashes: HashSet<PathBuf> = self
            .db
            .all_records()?
            .iter()
            .map(|(id, _)| record_to_path(id))
            .collect();

        let mut orphaned_dirs_removed = 0;
        for record_hash in self.file.list_blob_key_hashes()? {
            if !valid_hashes.contains(&record_hash) {
                self.file.remove_all(&record_hash)?;
                orphaned_dirs_removed += 1;
            }
        }

        self.codec.clear_cache();

        Ok(maintenance::MaintenanceOutcome {
            records_pruned: pruned.into_iter().map(|(id, _)| id).collect(),
            orphaned_dirs_removed,
        })
    }
}

#[cfg(test)]
mod tests;
