// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::driver::{MountTable, Storage, snapshot_name};
use crate::error::DriverError;
use crate::policy::{RotationPolicy, Slot, parse_timestamp_label};
use crate::volume::VolumeSpec;

/// A snapshot of the volume as found by [`SnapshotInventory::scan`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub label: String,
    /// `<volume>@<label>`
    pub name: String,
    /// Parsed from timestamp labels, `None` for slot labels
    pub created_at: Option<NaiveDateTime>,
    /// Where the snapshot was mounted at scan time
    pub mount_points: Vec<PathBuf>,
}

impl SnapshotEntry {
    pub fn is_mounted(&self) -> bool {
        !self.mount_points.is_empty()
    }

    pub fn is_bound_to(&self, published: &Path) -> bool {
        self.mount_points.iter().any(|path| path == published)
    }
}

/// Existing snapshots classified against the active policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inventory {
    /// Timestamp snapshots, oldest first
    Timestamp { snapshots: Vec<SnapshotEntry> },
    TwoSlot {
        a: Option<SnapshotEntry>,
        b: Option<SnapshotEntry>,
    },
}

impl Inventory {
    /// Inventory with no managed snapshots
    pub fn empty(policy: RotationPolicy) -> Self {
        match policy {
            RotationPolicy::Timestamp => Inventory::Timestamp {
                snapshots: Vec::new(),
            },
            RotationPolicy::TwoSlot => Inventory::TwoSlot { a: None, b: None },
        }
    }

    pub fn policy(&self) -> RotationPolicy {
        match self {
            Inventory::Timestamp { .. } => RotationPolicy::Timestamp,
            Inventory::TwoSlot { .. } => RotationPolicy::TwoSlot,
        }
    }

    /// Entry occupying `slot`; always `None` under the timestamp policy
    pub fn slot(&self, slot: Slot) -> Option<&SnapshotEntry> {
        match (self, slot) {
            (Inventory::TwoSlot { a, .. }, Slot::A) => a.as_ref(),
            (Inventory::TwoSlot { b, .. }, Slot::B) => b.as_ref(),
            (Inventory::Timestamp { .. }, _) => None,
        }
    }

    pub fn entries(&self) -> Vec<&SnapshotEntry> {
        match self {
            Inventory::Timestamp { snapshots } => snapshots.iter().collect(),
            Inventory::TwoSlot { a, b } => a.iter().chain(b.iter()).collect(),
        }
    }

    /// The managed snapshot bound to the published path, if any
    pub fn bound_to(&self, published: &Path) -> Option<&SnapshotEntry> {
        self.entries()
            .into_iter()
            .find(|entry| entry.is_bound_to(published))
    }
}

/// Read-only view over the snapshots of one volume
pub struct SnapshotInventory<'a> {
    storage: &'a dyn Storage,
    mounts: &'a dyn MountTable,
}

impl<'a> SnapshotInventory<'a> {
    pub fn new(storage: &'a dyn Storage, mounts: &'a dyn MountTable) -> Self {
        Self { storage, mounts }
    }

    /// List the volume's snapshots that `policy` manages, with their live mount points
    pub fn scan(
        &self,
        volume: &VolumeSpec,
        policy: RotationPolicy,
    ) -> Result<Inventory, DriverError> {
        let mut inventory = Inventory::empty(policy);

        for label in self.storage.list_snapshots(&volume.id)? {
            if !policy.owns_label(&label) {
                debug!("ignoring unmanaged snapshot {}@{}", volume.id, label);
                continue;
            }

            let name = snapshot_name(&volume.id, &label);
            let entry = SnapshotEntry {
                created_at: parse_timestamp_label(&label),
                mount_points: self.mounts.mount_points_of(&name)?,
                label,
                name,
            };

            match &mut inventory {
                Inventory::Timestamp { snapshots } => snapshots.push(entry),
                Inventory::TwoSlot { a, b } => match Slot::from_label(&entry.label) {
                    Some(Slot::A) => *a = Some(entry),
                    Some(Slot::B) => *b = Some(entry),
                    None => {}
                },
            }
        }

        if let Inventory::Timestamp { snapshots } = &mut inventory {
            snapshots.sort_by_key(|entry| entry.created_at);
        }

        debug!(
            "found {} managed snapshot(s) of {}",
            inventory.entries().len(),
            volume.id
        );
        Ok(inventory)
    }
}
