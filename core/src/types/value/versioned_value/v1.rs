//! Unified note without attachments (schema version 3).

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
}

impl ValueVariant for Value {
    const VERSION: u8 = 1;
}
