//! Record export format exchanged with a sync peer.
//!
//! ```json
//! {"id": "...", "content": "<ciphertext>", "updatedAt": 1, "deletedAt": null,
//!  "attachments": [{"id", "name", "mimeType", "size", "uploadedAt"}],
//!  "attachmentPayloads": [{"attachmentId": "...", "bytes": "<base64>"}]}
//! ```
//!
//! Content and payload bytes stay encrypted; transport is the caller's concern.

use crate::types::{Attachment, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedRecord {
    pub id: String,
    pub content: String,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub attachment_payloads: Vec<AttachmentPayload>,
}

impl ExportedRecord {
    pub fn payload(&self, attachment_id: &str) -> Option<&[u8]> {
        self.attachment_payloads
            .iter()
            .find(|p| p.attachment_id == attachment_id)
            .map(|p| p.bytes.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub attachment_id: String,
    /// Stored (encrypted) bytes, base64 in JSON.
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
