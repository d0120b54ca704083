use super::LifecycleConfig;
use crate::error::ValidationError;
use crate::types::duration::parse_duration;
use std::time::Duration;

/// Default interval between two maintenance runs.
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default retention of soft-deleted records before they are pruned.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Retention used by the strict note-only mode.
pub const STRICT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Settings passed to the maintenance scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub interval: Duration,
    pub retention: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_MAINTENANCE_INTERVAL,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl MaintenanceConfig {
    pub fn strict() -> Self {
        Self {
            retention: STRICT_RETENTION,
            ..Self::default()
        }
    }
}

impl TryFrom<&LifecycleConfig> for MaintenanceConfig {
    type Error = ValidationError;

    fn try_from(config: &LifecycleConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            interval: parse_duration(&config.maintenance_interval)?,
            retention: parse_duration(&config.retention)?,
        })
    }
}
