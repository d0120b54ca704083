//! Decrypted record payloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name to value map used by the structured (pre-unified) schema generations.
pub type Fields = BTreeMap<String, String>;

/// Logical content of a record once decrypted.
///
/// The canonical string form is JSON: `Raw` encodes as a JSON string and
/// `Structured` as a JSON object, so the two variants never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Free tagged text, used by the unified note generation.
    Raw(String),
    /// Named fields, used by the per-type and typed-entry generations.
    Structured(Fields),
}

impl Payload {
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Payload::Raw(text) => Some(text),
            Payload::Structured(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<String> {
        match self {
            Payload::Raw(text) => Some(text),
            Payload::Structured(_) => None,
        }
    }

    /// Case-insensitive substring match against the raw text, or against every
    /// field value of a structured payload. An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        if query.is_empty() {
            return true;
        }
        match self {
            Payload::Raw(text) => text.to_lowercase().contains(&query),
            Payload::Structured(fields) => fields
                .values()
                .any(|value| value.to_lowercase().contains(&query)),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Raw(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Raw(text.to_string())
    }
}

impl From<Fields> for Payload {
    fn from(fields: Fields) -> Self {
        Payload::Structured(fields)
    }
}
