use crate::types::record_id::RecordId;
use crate::types::timestamp::Timestamp;
use redb::TypeName;
use std::cmp::Ordering;

/// Entry of an ordered index table: records sorted by a timestamp, ties broken by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    /// For the live index this is `updated_at`, for the deleted index `deleted_at`.
    pub timestamp: Timestamp,
    pub id: RecordId,
}

fn extract_timestamp(data: &[u8]) -> (i64, &[u8]) {
    let (ms, data) = data
        .split_first_chunk::<8>()
        .expect("index key shorter than its timestamp");
    // Stored with the sign bit flipped so that the byte order is the numeric order.
    let ms = (u64::from_be_bytes(*ms) ^ (1 << 63)) as i64;
    (ms, data)
}

impl redb::Key for IndexKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        let (ms1, id1) = extract_timestamp(data1);
        let (ms2, id2) = extract_timestamp(data2);

        ms1.cmp(&ms2)
            .then_with(|| <RecordId as redb::Key>::compare(id1, id2))
    }
}

impl redb::Value for IndexKey {
    type SelfType<'a> = IndexKey;
    type AsBytes<'a> = Vec<u8>;

    fn fixed_width() -> Option<usize> {
        None
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let (ms, data) = extract_timestamp(data);
        let id = <RecordId as redb::Value>::from_bytes(data);

        IndexKey {
            timestamp: Timestamp::from_millis(ms),
            id,
        }
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'b,
    {
        let mut bytes = Vec::with_capacity(8 + value.id.len());
        let ordered = (value.timestamp.as_millis() as u64) ^ (1 << 63);
        bytes.extend_from_slice(&ordered.to_be_bytes());
        bytes.extend_from_slice(<RecordId as redb::Value>::as_bytes(&value.id));
        bytes
    }

    fn type_name() -> TypeName {
        TypeName::new("t3vo::IndexKey")
    }
}
