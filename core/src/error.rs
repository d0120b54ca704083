use thiserror::Error;

/// Input rejected before any storage I/O happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("attachment {name} is {size} bytes, exceeds {max} bytes")]
    AttachmentTooLarge { name: String, size: u64, max: u64 },

    #[error("invalid duration: {0:?} (expected <n>m, <n>h or <n>d)")]
    InvalidDuration(String),

    #[error("invalid record id: {0:?}")]
    InvalidId(String),

    #[error("invalid page request: {0}")]
    InvalidPage(String),

    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(String),
}
