pub mod core;
pub mod crypto;
pub mod error;
pub mod parser;
pub mod sync;
pub mod types;

pub use crate::core::error::VaultError;
pub use crate::core::maintenance::{MaintenanceOutcome, MaintenanceScheduler};
pub use crate::core::{PageQuery, VaultCore};
pub use crate::error::ValidationError;
