pub(crate) mod config;
pub use config::{
    AppConfig, AppConfigError, Config, LifecycleConfig, MaintenanceConfig, VaultSettings,
};

pub(crate) mod duration;
pub use duration::{format_duration, parse_duration};

pub(crate) mod export;
pub use export::{AttachmentPayload, ExportedRecord};

pub(crate) mod index_key;
pub use index_key::IndexKey;

pub(crate) mod metadata;

pub(crate) mod payload;
pub use payload::{Fields, Payload};

pub(crate) mod record_id;
pub use record_id::{MAX_ID_LENGTH, RecordId};

pub(crate) mod timestamp;
pub use timestamp::Timestamp;

pub(crate) mod value;
pub use value::{Attachment, NewAttachment, Record};
