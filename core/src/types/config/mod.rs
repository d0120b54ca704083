mod app;
mod core;
mod maintenance;

pub use app::{AppConfig, AppConfigError, LifecycleConfig, VaultSettings};
pub use core::Config;
pub use maintenance::MaintenanceConfig;
