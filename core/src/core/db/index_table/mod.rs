use crate::core::db::error::DatabaseError;
use crate::types::{IndexKey, RecordId, Timestamp};
use redb::{ReadTransaction, ReadableTable, ReadableTableMetadata, TableDefinition, WriteTransaction};

/// Stores `IndexKey { timestamp, id }` entries ordered by timestamp then id.
/// The main table stays the source of truth; callers keep the two in step
/// inside the same write transaction.
pub struct IndexTable {
    definition: TableDefinition<'static, IndexKey, ()>,
}

impl IndexTable {
    pub const fn new(name: &'static str) -> Self {
        Self {
            definition: TableDefinition::new(name),
        }
    }

    pub fn init(&self, txn: &WriteTransaction) -> Result<(), DatabaseError> {
        txn.open_table(self.definition)?;
        Ok(())
    }

    pub fn insert(&self, txn: &WriteTransaction, key: &IndexKey) -> Result<(), DatabaseError> {
        let mut table = txn.open_table(self.definition)?;
        table.insert(key, &())?;
        Ok(())
    }

    /// Returns `true` if the key was present.
    pub fn remove(&self, txn: &WriteTransaction, key: &IndexKey) -> Result<bool, DatabaseError> {
        let mut table = txn.open_table(self.definition)?;
        Ok(table.remove(key)?.is_some())
    }

    /// Returns ids whose timestamp is at or before `cutoff`, oldest first.
    pub fn keys_up_to(
        &self,
        txn: &ReadTransaction,
        cutoff: Timestamp,
    ) -> Result<Vec<RecordId>, DatabaseError> {
        let Some(end) = cutoff.as_millis().checked_add(1) else {
            return self.all_keys(txn);
        };

        let table = txn.open_table(self.definition)?;

        table
            .range(
                ..IndexKey {
                    timestamp: Timestamp::from_millis(end),
                    // SAFETY: This key is only used for range querying, so the empty value is not stored.
                    id: unsafe { RecordId::new_unchecked(String::new()) },
                },
            )?
            .map(|entry| {
                let (key_guard, _) = entry?;
                Ok(key_guard.value().id)
            })
            .collect()
    }

    /// Returns up to `limit` ids after skipping `offset`, newest first.
    pub fn newest_first(
        &self,
        txn: &ReadTransaction,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RecordId>, DatabaseError> {
        let table = txn.open_table(self.definition)?;

        table
            .iter()?
            .rev()
            .skip(offset)
            .take(limit)
            .map(|entry| {
                let (key_guard, _) = entry?;
                Ok(key_guard.value().id)
            })
            .collect()
    }

    /// All ids, oldest first.
    pub fn all_keys(&self, txn: &ReadTransaction) -> Result<Vec<RecordId>, DatabaseError> {
        let table = txn.open_table(self.definition)?;
        let mut keys = Vec::new();

        for entry in table.iter()? {
            let (key_guard, _) = entry?;
            keys.push(key_guard.value().id);
        }

        Ok(keys)
    }

    pub fn len(&self, txn: &ReadTransaction) -> Result<u64, DatabaseError> {
        let table = txn.open_table(self.definition)?;
        Ok(table.len()?)
    }
}
