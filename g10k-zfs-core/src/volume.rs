// SPDX-License-Identifier: GPL-3.0-only

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::driver::{MountTable, Storage};
use crate::error::VolumeError;

/// Backing dataset and the directory it is mounted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub id: String,
    pub mount_point: PathBuf,
}

impl VolumeSpec {
    /// Dataset named after its mount point inside `pool`: (`tank`, `/g10k`) -> `tank/g10k`
    pub fn in_pool(pool: &str, mount_point: impl Into<PathBuf>) -> Self {
        let mount_point = mount_point.into();
        let relative = mount_point.to_string_lossy();
        let relative = relative.trim_matches('/');
        Self {
            id: format!("{}/{}", pool.trim_end_matches('/'), relative),
            mount_point,
        }
    }
}

/// What [`VolumeLifecycle::ensure`] had to repair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeStatus {
    pub created: bool,
    pub directory_created: bool,
    pub mounted: bool,
}

pub struct VolumeLifecycle<'a> {
    storage: &'a dyn Storage,
    mounts: &'a dyn MountTable,
}

impl<'a> VolumeLifecycle<'a> {
    pub fn new(storage: &'a dyn Storage, mounts: &'a dyn MountTable) -> Self {
        Self { storage, mounts }
    }

    /// Create, prepare and mount the volume as needed
    pub fn ensure(&self, volume: &VolumeSpec) -> Result<VolumeStatus, VolumeError> {
        let mut status = VolumeStatus::default();

        let exists = self
            .storage
            .dataset_exists(&volume.id)
            .map_err(|source| VolumeError::Query {
                volume: volume.id.clone(),
                source,
            })?;
        if exists {
            debug!("filesystem {} already existing", volume.id);
        } else {
            self.storage
                .create_filesystem(&volume.id, &volume.mount_point)
                .map_err(|source| VolumeError::Create {
                    volume: volume.id.clone(),
                    source,
                })?;
            info!("created filesystem {}", volume.id);
            status.created = true;
        }

        status.directory_created = prepare_directory(&volume.mount_point).map_err(|source| {
            VolumeError::PathSetup {
                path: volume.mount_point.clone(),
                source,
            }
        })?;

        let mounted = self
            .mounts
            .is_mounted(&volume.mount_point)
            .map_err(|source| VolumeError::Mount {
                volume: volume.id.clone(),
                path: volume.mount_point.clone(),
                source,
            })?;
        if mounted {
            debug!("filesystem {} already mounted", volume.id);
        } else {
            self.storage
                .mount_default(&volume.id)
                .map_err(|source| VolumeError::Mount {
                    volume: volume.id.clone(),
                    path: volume.mount_point.clone(),
                    source,
                })?;
            info!(
                "mounted filesystem {} on {}",
                volume.id,
                volume.mount_point.display()
            );
            status.mounted = true;
        }

        Ok(status)
    }
}

/// Returns whether the directory had to be created
fn prepare_directory(path: &Path) -> io::Result<bool> {
    match DirBuilder::new().mode(0o755).create(path) {
        Ok(()) => {
            debug!("created mount point {}", path.display());
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            if path.is_dir() {
                Ok(false)
            } else {
                Err(io::Error::other("exists but is not a directory"))
            }
        }
        Err(err) => Err(err),
    }
}
