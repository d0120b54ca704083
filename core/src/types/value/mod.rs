//! Public record types for consumers.
//!
//! `Record` is exported from `t3vo_core::types`; the stored shapes live in
//! `versioned_value`.

use crate::parser::{self, ParsedNote};
use crate::types::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

pub(crate) mod versioned_value;

use versioned_value::latest_value;

/// A record read from the store with its content decrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    /// Decrypted raw tagged text. `None` means the ciphertext could not be
    /// decrypted with the session key, not that the note is empty.
    pub content: Option<String>,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub attachments: Vec<Attachment>,
}

impl Record {
    pub(crate) fn from_latest_value(
        id: RecordId,
        value: latest_value::Value,
        content: Option<String>,
    ) -> Self {
        Self {
            id,
            content,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
            attachments: value.attachments.into_iter().map(Attachment::from).collect(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Structured view of the content. Recomputed on every call.
    pub fn parse(&self) -> Option<ParsedNote> {
        self.content.as_deref().map(parser::parse)
    }
}

/// Attachment metadata. The binary payload is stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: Timestamp,
}

impl From<latest_value::Attachment> for Attachment {
    fn from(a: latest_value::Attachment) -> Self {
        Self {
            id: a.id,
            name: a.name,
            mime_type: a.mime_type,
            size: a.size,
            uploaded_at: a.uploaded_at,
        }
    }
}

impl From<Attachment> for latest_value::Attachment {
    fn from(a: Attachment) -> Self {
        Self {
            id: a.id,
            name: a.name,
            mime_type: a.mime_type,
            size: a.size,
            uploaded_at: a.uploaded_at,
        }
    }
}

/// A file to attach to a record.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
