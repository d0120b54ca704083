//! Metadata types for persistent vault state.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Maintenance metadata. Missing fields default to None.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceMetadata {
    #[serde(default)]
    pub last_maintenance_run: Option<Timestamp>,
}

/// Schema version of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub version: u32,
}
