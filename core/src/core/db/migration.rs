//! Upgrades older store layouts to the current one.
//!
//! | version | layout                                                        |
//! |---------|---------------------------------------------------------------|
//! | 1       | per-type tables `passwords`, `bookmarks`, `notes`              |
//! | 2       | one `entries` table of typed entries                           |
//! | 3       | unified `records` table, raw tagged text, no attachments       |
//! | 4       | unified `records` table with attachments                       |
//!
//! Each step runs in a single write transaction that also stores the new
//! version, so a failed step leaves the store untouched at the old version.

use crate::core::db::error::DatabaseError;
use crate::core::db::{Database, MAIN_TABLE};
use crate::crypto::CipherCodec;
use crate::parser::{self, NoteType};
use crate::types::value::versioned_value::{VersionedValue, v1};
use crate::types::{Fields, Payload, RecordId, Timestamp};
use redb::{ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Display;
use tracing::{debug, info};

pub const CURRENT_SCHEMA: u32 = 4;

pub(crate) const PASSWORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("passwords");
pub(crate) const BOOKMARKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("bookmarks");
pub(crate) const NOTES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("notes");
pub(crate) const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

const PER_TYPE_TABLES: [(TableDefinition<&str, &[u8]>, &str); 3] = [
    (PASSWORDS_TABLE, "password"),
    (BOOKMARKS_TABLE, "bookmark"),
    (NOTES_TABLE, "note"),
];

/// Row of a version 1 per-type table. `data` is an encrypted JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LegacyEntry {
    pub data: String,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// Row of the version 2 `entries` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TypedEntry {
    pub entry_type: String,
    pub data: String,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Rows rewritten across all steps.
    pub migrated: usize,
}

fn corrupt(context: impl Display, err: impl Display) -> DatabaseError {
    DatabaseError::Corrupt(format!("{context}: {err}"))
}

fn table_names(txn: &redb::WriteTransaction) -> Result<HashSet<String>, DatabaseError> {
    Ok(txn
        .list_tables()?
        .map(|handle| handle.name().to_string())
        .collect())
}

/// Field names of the structured generations mapped to tag keys.
fn legacy_key(key: &str) -> String {
    match key {
        "totpSecret" => "2fa".to_string(),
        "urls" => "domains".to_string(),
        "url" => "bookmark".to_string(),
        "note" | "content" => "body".to_string(),
        other => other.to_lowercase(),
    }
}

/// Flattens one structured field. Lists become comma separated, nulls drop out.
fn legacy_scalar(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(legacy_scalar)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// Renders a decrypted typed-entry payload as raw tagged text.
///
/// Returns `None` for payloads that are neither text nor an object.
fn legacy_text(entry_type: &str, data: Value) -> Option<String> {
    let object = match data {
        Value::String(text) => return Some(text),
        Value::Object(object) => object,
        _ => return None,
    };

    let note_type = entry_type.parse().unwrap_or(NoteType::Note);
    let mut mapped = Fields::new();
    for (key, value) in object {
        let Some(value) = legacy_scalar(value) else {
            continue;
        };
        let key = legacy_key(&key);
        match mapped.get_mut(&key) {
            // `note` and `content` both land in the body.
            Some(existing) if !value.is_empty() => {
                if !existing.is_empty() {
                    existing.push_str("\n\n");
                }
                existing.push_str(&value);
            }
            Some(_) => {}
            None => {
                mapped.insert(key, value);
            }
        }
    }
    Some(parser::serialize(note_type, &mapped))
}

/// Schema upgrade.
impl Database {
    /// Brings the store to [`CURRENT_SCHEMA`]. Safe to call on every open.
    pub fn upgrade(&mut self, codec: &CipherCodec) -> Result<UpgradeReport, DatabaseError> {
        let from_version = match self.schema_version()? {
            Some(version) => version,
            None => self.detect_version()?,
        };

        if from_version > CURRENT_SCHEMA {
            return Err(DatabaseError::Corrupt(format!(
                "store schema {from_version} is newer than supported {CURRENT_SCHEMA}"
            )));
        }

        let mut report = UpgradeReport {
            from_version,
            to_version: from_version,
            migrated: 0,
        };

        if report.to_version < 2 {
            report.migrated += self.upgrade_per_type_tables()?;
            report.to_version = 2;
        }
        if report.to_version < 3 {
            report.migrated += self.upgrade_typed_entries(codec)?;
            report.to_version = 3;
        }
        if report.to_version < 4 {
            report.migrated += self.upgrade_attachment_lists()?;
            report.to_version = 4;
        }

        // Fresh stores and current stores only get their tables ensured.
        let write_txn = self.db.begin_write()?;
        Self::init_tables(&write_txn)?;
        Self::set_schema_version_in(&write_txn, CURRENT_SCHEMA)?;
        write_txn.commit()?;

        if from_version < CURRENT_SCHEMA {
            info!(
                from = from_version,
                to = CURRENT_SCHEMA,
                migrated = report.migrated,
                "store upgraded"
            );
        }

        Ok(report)
    }

    fn detect_version(&self) -> Result<u32, DatabaseError> {
        let read_txn = self.db.begin_read()?;
        let names: HashSet<String> = read_txn
            .list_tables()?
            .map(|handle| handle.name().to_string())
            .collect();

        let version = if names.contains(ENTRIES_TABLE.name()) {
            2
        } else if PER_TYPE_TABLES
            .iter()
            .any(|(table, _)| names.contains(table.name()))
        {
            1
        } else {
            CURRENT_SCHEMA
        };
        debug!(version, "detected unversioned store layout");
        Ok(version)
    }

    /// 1 → 2: copies every per-type row into `entries` and drops the old tables.
    fn upgrade_per_type_tables(&mut self) -> Result<usize, DatabaseError> {
        let write_txn = self.db.begin_write()?;
        let existing = table_names(&write_txn)?;
        let mut moved = 0;

        {
            let mut entries = write_txn.open_table(ENTRIES_TABLE)?;

            for (definition, entry_type) in PER_TYPE_TABLES {
                if !existing.contains(definition.name()) {
                    continue;
                }
                let legacy = write_txn.open_table(definition)?;
                for row in legacy.iter()? {
                    let (id, bytes) = row?;
                    let entry: LegacyEntry = postcard::from_bytes(bytes.value())
                        .map_err(|e| corrupt(format_args!("{} row {}", definition.name(), id.value()), e))?;

                    let typed = TypedEntry {
                        entry_type: entry_type.to_string(),
                        data: entry.data,
                        updated_at: entry.updated_at,
                        deleted_at: entry.deleted_at,
                    };
                    let encoded = postcard::to_allocvec(&typed)
                        .map_err(|e| corrupt(format_args!("entry {}", id.value()), e))?;
                    entries.insert(id.value(), encoded.as_slice())?;
                    moved += 1;
                }
            }
        }

        for (definition, _) in PER_TYPE_TABLES {
            if existing.contains(definition.name()) {
                write_txn.delete_table(definition)?;
            }
        }

        Self::set_schema_version_in(&write_txn, 2)?;
        write_txn.commit()?;

        debug!(moved, "per-type tables merged into entries");
        Ok(moved)
    }

    /// 2 → 3: turns each typed entry into a raw tagged note.
    ///
    /// An entry that cannot be decrypted with the session key aborts the
    /// whole step.
    fn upgrade_typed_entries(&mut self, codec: &CipherCodec) -> Result<usize, DatabaseError> {
        let write_txn = self.db.begin_write()?;
        let existing = table_names(&write_txn)?;
        Self::init_tables(&write_txn)?;

        let mut converted = 0;

        if existing.contains(ENTRIES_TABLE.name()) {
            {
                let mut main_table = write_txn.open_table(MAIN_TABLE)?;
                let entries = write_txn.open_table(ENTRIES_TABLE)?;

                for row in entries.iter()? {
                    let (raw_id, bytes) = row?;
                    let raw_id = raw_id.value();
                    let entry: TypedEntry = postcard::from_bytes(bytes.value())
                        .map_err(|e| corrupt(format_args!("entry {raw_id}"), e))?;
                    let id = RecordId::try_new(raw_id.to_string())
                        .map_err(|e| corrupt(format_args!("entry {raw_id:?}"), e))?;

                    let canonical = codec.decrypt_text(&entry.data).ok_or_else(|| {
                        DatabaseError::Corrupt(format!(
                            "entry {id} cannot be decrypted with this passphrase"
                        ))
                    })?;
                    let data: Value = serde_json::from_str(&canonical)
                        .map_err(|e| corrupt(format_args!("entry {id} payload"), e))?;
                    let text = legacy_text(&entry.entry_type, data).ok_or_else(|| {
                        DatabaseError::Corrupt(format!(
                            "entry {id} payload is neither text nor an object"
                        ))
                    })?;
                    let content = codec
                        .encrypt(&Payload::Raw(text))
                        .map_err(|e| corrupt(format_args!("entry {id}"), e))?;

                    let value = VersionedValue::V1(v1::Value {
                        content,
                        updated_at: entry.updated_at,
                        deleted_at: entry.deleted_at,
                    });
                    Self::index(&write_txn, &id, &value.clone().into_latest())?;
                    main_table.insert(&id, &value)?;
                    converted += 1;
                }
            }

            write_txn.delete_table(ENTRIES_TABLE)?;
        }

        Self::set_schema_version_in(&write_txn, 3)?;
        write_txn.commit()?;

        debug!(converted, "typed entries converted to notes");
        Ok(converted)
    }

    /// 3 → 4: rewrites attachment-less values with an empty attachment list.
    fn upgrade_attachment_lists(&mut self) -> Result<usize, DatabaseError> {
        let write_txn = self.db.begin_write()?;
        Self::init_tables(&write_txn)?;

        let mut rewritten = 0;

        {
            let mut main_table = write_txn.open_table(MAIN_TABLE)?;

            let outdated: Vec<(RecordId, VersionedValue)> = main_table
                .iter()?
                .filter_map(|row| match row {
                    Ok((id, value)) => {
                        let value = value.value();
                        matches!(value, VersionedValue::V1(_)).then(|| Ok((id.value(), value)))
                    }
                    Err(e) => Some(Err(e)),
                })
                .collect::<Result<_, _>>()?;

            for (id, value) in outdated {
                main_table.insert(&id, &VersionedValue::from(value.into_latest()))?;
                rewritten += 1;
            }
        }

        Self::set_schema_version_in(&write_txn, 4)?;
        write_txn.commit()?;

        debug!(rewritten, "attachment lists backfilled");
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests;
