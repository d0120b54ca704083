//! Unified note with attachments (schema version 4, current).

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

use super::ValueVariant;

#[cfg_attr(test, derive(Eq, PartialEq))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    /// Encrypted raw tagged text.
    pub content: String,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub attachments: Vec<Attachment>,
}

impl ValueVariant for Value {
    const VERSION: u8 = 2;
}

impl Value {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: Timestamp,
}
