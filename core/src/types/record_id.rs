use nutype::nutype;
use redb::TypeName;
use std::cmp::Ordering;
use std::str;

pub const MAX_ID_LENGTH: usize = 128;

/// Stable identifier of a record. Assigned once at creation and never changed.
#[nutype(
    new_unchecked,
    sanitize(trim),
    validate(not_empty, len_char_max = MAX_ID_LENGTH),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        AsRef,
        Deref,
        TryFrom,
        Into,
        Hash,
        Borrow,
        Display,
        Serialize,
        Deserialize,
    )
)]
pub struct RecordId(String);

impl RecordId {
    /// Derives an id from the encrypted content and the creation instant.
    ///
    /// `attempt` disambiguates the rare case of two identical writes within
    /// the same millisecond.
    pub(crate) fn derive(ciphertext: &str, created_at_ms: i64, attempt: u32) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ciphertext.as_bytes());
        hasher.update(&created_at_ms.to_be_bytes());
        hasher.update(&attempt.to_be_bytes());
        let hex = hasher.finalize().to_hex();

        // SAFETY: a blake3 hex digest is 64 ASCII characters, within bounds and never empty.
        unsafe { Self::new_unchecked(hex.to_string()) }
    }
}

impl redb::Key for RecordId {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        let s1 = str::from_utf8(data1).expect("invalid UTF-8 in record id");
        let s2 = str::from_utf8(data2).expect("invalid UTF-8 in record id");

        s1.cmp(s2)
    }
}

impl redb::Value for RecordId {
    type SelfType<'a> = Self;
    type AsBytes<'a> = &'a [u8];

    fn fixed_width() -> Option<usize> {
        None
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        let s = str::from_utf8(data).expect("invalid UTF-8 in record id");
        // SAFETY: ids are validated before they are ever written.
        unsafe { Self::new_unchecked(s.to_string()) }
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'b,
    {
        value.as_bytes()
    }

    fn type_name() -> TypeName {
        TypeName::new("t3vo::RecordId")
    }
}
