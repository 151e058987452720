// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::driver::{DestroyOptions, MountTable, Storage};
use crate::error::{
    DriverError, MountError, RetentionStage, RetentionWarning, RunError, SnapshotError,
};
use crate::inventory::{Inventory, SnapshotEntry};
use crate::policy::Slot;
use crate::switcher::MountSwitcher;
use crate::volume::VolumeSpec;

/// Held or cloned snapshots are marked for deferred destruction
const DESTROY_OPTIONS: DestroyOptions = DestroyOptions {
    defer: true,
    recursive: false,
};

/// Outcome of a best-effort sweep
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub destroyed: Vec<String>,
    pub warnings: Vec<RetentionWarning>,
}

/// Snapshots of `inventory` that become stale once `active` is published
pub fn stale_entries<'i>(inventory: &'i Inventory, active: &str) -> Vec<&'i SnapshotEntry> {
    match inventory {
        Inventory::Timestamp { snapshots } => snapshots
            .iter()
            .filter(|entry| entry.label != active)
            .collect(),
        Inventory::TwoSlot { .. } => Slot::from_label(active)
            .and_then(|slot| inventory.slot(slot.other()))
            .into_iter()
            .collect(),
    }
}

/// Destroys stale snapshots, never while they are still mounted
pub struct RetentionEnforcer<'a> {
    storage: &'a dyn Storage,
    mounts: &'a dyn MountTable,
}

impl<'a> RetentionEnforcer<'a> {
    pub fn new(storage: &'a dyn Storage, mounts: &'a dyn MountTable) -> Self {
        Self { storage, mounts }
    }

    /// Destroy every snapshot the policy marks stale after `active` was bound.
    ///
    /// Failures are collected per snapshot and do not stop the sweep.
    pub fn sweep(&self, volume: &VolumeSpec, inventory: &Inventory, active: &str) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for entry in stale_entries(inventory, active) {
            match self.retire(volume, entry) {
                Ok(true) => outcome.destroyed.push(entry.name.clone()),
                Ok(false) => {}
                Err(warning) => {
                    warn!("{}", warning);
                    outcome.warnings.push(warning);
                }
            }
        }

        outcome
    }

    /// Clear both slots so naming can start over from `A`.
    ///
    /// Unlike [`Self::sweep`] every failure here is fatal: the new snapshot
    /// cannot be created while its slot is still occupied.
    pub fn clear_slots(
        &self,
        volume: &VolumeSpec,
        published: &Path,
        inventory: &Inventory,
    ) -> Result<Vec<String>, RunError> {
        warn!(
            "both snapshot slots of {} exist, destroying them before rotating",
            volume.id
        );

        MountSwitcher::new(self.mounts).unbind(published)?;

        let mut destroyed = Vec::new();
        for slot in Slot::ALL {
            let Some(entry) = inventory.slot(slot) else {
                continue;
            };

            self.release(&entry.name)?;
            let removed = self
                .destroy(volume, entry)
                .map_err(|source| SnapshotError::Destroy {
                    snapshot: entry.name.clone(),
                    source,
                })?;
            if removed {
                destroyed.push(entry.name.clone());
            }
        }

        Ok(destroyed)
    }

    /// Returns whether the snapshot was actually destroyed
    fn retire(&self, volume: &VolumeSpec, entry: &SnapshotEntry) -> Result<bool, RetentionWarning> {
        self.release(&entry.name)
            .map_err(|err| RetentionWarning {
                snapshot: entry.name.clone(),
                stage: RetentionStage::Unmount,
                source: err.into_driver_error(),
            })?;

        self.destroy(volume, entry)
            .map_err(|source| RetentionWarning {
                snapshot: entry.name.clone(),
                stage: RetentionStage::Destroy,
                source,
            })
    }

    /// Unmount `snapshot` everywhere the live mount table shows it.
    ///
    /// A mount point where something else is mounted on top is left alone,
    /// since unmounting it would remove the covering mount instead.
    fn release(&self, snapshot: &str) -> Result<(), MountError> {
        for path in self.mount_points(snapshot)? {
            let top = self
                .mounts
                .mounted_source(&path)
                .map_err(|source| MountError::Query {
                    path: path.clone(),
                    source,
                })?;
            if let Some(top) = top.filter(|top| top != snapshot) {
                let busy = DriverError::Busy(format!("{snapshot} is covered by {top}"));
                return Err(MountError::Unmount { path, source: busy });
            }

            self.mounts
                .unmount(&path)
                .map_err(|source| MountError::Unmount {
                    path: path.clone(),
                    source,
                })?;
            info!("unmounted {} from {}", snapshot, path.display());
        }

        if let Some(path) = self.mount_points(snapshot)?.into_iter().next() {
            let busy = DriverError::Busy(format!("{snapshot} still mounted on {}", path.display()));
            return Err(MountError::Unmount { path, source: busy });
        }

        Ok(())
    }

    fn mount_points(&self, snapshot: &str) -> Result<Vec<PathBuf>, MountError> {
        self.mounts
            .mount_points_of(snapshot)
            .map_err(|source| MountError::Lookup {
                snapshot: snapshot.to_string(),
                source,
            })
    }

    /// Absent snapshots count as already destroyed
    fn destroy(&self, volume: &VolumeSpec, entry: &SnapshotEntry) -> Result<bool, DriverError> {
        match self
            .storage
            .destroy_snapshot(&volume.id, &entry.label, DESTROY_OPTIONS)
        {
            Ok(()) => {
                info!("destroyed snapshot {}", entry.name);
                Ok(true)
            }
            Err(err) if err.is_not_found() => {
                debug!("snapshot {} already gone", entry.name);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
