//! Interval-gated pruning of soft-deleted records.

use crate::core::VaultCore;
use crate::core::error::VaultError;
use crate::types::{MaintenanceConfig, RecordId, Timestamp};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaintenanceOutcome {
    pub records_pruned: Vec<RecordId>,
    pub orphaned_dirs_removed: usize,
}

/// Runs [`VaultCore::maintenance`] at most once per configured interval.
///
/// The last run time lives in the vault's metadata table, so the interval
/// holds across process restarts. Meant to be triggered at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaintenanceScheduler {
    config: MaintenanceConfig,
}

impl MaintenanceScheduler {
    pub fn new(config: MaintenanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    /// Returns `None` without touching the store when the previous run is
    /// more recent than the interval.
    pub fn maybe_run(
        &self,
        core: &mut VaultCore,
        now: Timestamp,
    ) -> Result<Option<MaintenanceOutcome>, VaultError> {
        if !core.should_run_maintenance(now, self.config.interval)? {
            debug!(%now, "maintenance not due");
            return Ok(None);
        }

        let outcome = core.maintenance(now, self.config.retention)?;
        info!(
            pruned = outcome.records_pruned.len(),
            orphaned_dirs = outcome.orphaned_dirs_removed,
            "maintenance completed"
        );
        Ok(Some(outcome))
    }

    /// Like [`maybe_run`](Self::maybe_run) but logs failures instead of
    /// returning them.
    pub fn run_logged(&self, core: &mut VaultCore, now: Timestamp) -> Option<MaintenanceOutcome> {
        match self.maybe_run(core, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "maintenance failed");
                None
            }
        }
    }
}
