// SPDX-License-Identifier: GPL-3.0-only

//! Collaborator contracts consumed by the rotation core.
//!
//! The real implementations live in `g10k-zfs-sys` (zfs command line,
//! `/proc/self/mountinfo`, chown); `g10k-zfs-testing` implements all of them
//! in memory.

use std::path::{Path, PathBuf};

use crate::error::DriverError;

/// Full snapshot name, `<volume>@<label>`
pub fn snapshot_name(volume: &str, label: &str) -> String {
    format!("{volume}@{label}")
}

/// Flags for [`Storage::destroy_snapshot`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Mark for deferred destruction instead of failing when held or cloned
    pub defer: bool,
    pub recursive: bool,
}

/// Dataset and snapshot primitives of the storage subsystem
pub trait Storage {
    fn dataset_exists(&self, id: &str) -> Result<bool, DriverError>;

    /// Create a filesystem dataset whose default mount lands on `mount_point`
    fn create_filesystem(&self, id: &str, mount_point: &Path) -> Result<(), DriverError>;

    /// Must fail with [`DriverError::AlreadyExists`] instead of replacing an existing label
    fn create_snapshot(&self, id: &str, label: &str) -> Result<(), DriverError>;

    /// Must fail with [`DriverError::NotFound`] when the snapshot is absent
    fn destroy_snapshot(
        &self,
        id: &str,
        label: &str,
        options: DestroyOptions,
    ) -> Result<(), DriverError>;

    /// Mount the dataset's own (writable) view at its configured mount point
    fn mount_default(&self, id: &str) -> Result<(), DriverError>;

    /// Labels of the direct snapshots of `id`, oldest first
    fn list_snapshots(&self, id: &str) -> Result<Vec<String>, DriverError>;
}

/// A mount the mount table should perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub device: String,
    pub path: PathBuf,
    pub fstype: String,
    pub options: String,
}

/// Kernel mount table queries and mount/unmount calls
pub trait MountTable {
    /// Source currently mounted on `path` (the topmost one if stacked)
    fn mounted_source(&self, path: &Path) -> Result<Option<String>, DriverError>;

    fn is_mounted(&self, path: &Path) -> Result<bool, DriverError> {
        Ok(self.mounted_source(path)?.is_some())
    }

    /// Every mount point `source` is mounted on
    fn mount_points_of(&self, source: &str) -> Result<Vec<PathBuf>, DriverError>;

    fn mount(&self, request: &MountRequest) -> Result<(), DriverError>;

    fn unmount(&self, path: &Path) -> Result<(), DriverError>;
}

/// User and group that should own the published files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSpec {
    pub user: String,
    pub group: String,
}

/// Recursive ownership fix-up, run on the volume after it is ready
pub trait Ownership {
    fn apply(&self, path: &Path, owner: &OwnerSpec) -> Result<(), DriverError>;
}
