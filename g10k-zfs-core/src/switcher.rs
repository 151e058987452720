// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::driver::{MountRequest, MountTable, snapshot_name};
use crate::error::{DriverError, MountError};

/// Filesystem type passed to the kernel for snapshot mounts
pub const SNAPSHOT_FSTYPE: &str = "zfs";
/// Snapshots are immutable; mount them read-only
pub const SNAPSHOT_MOUNT_OPTIONS: &str = "ro";
/// Upper bound on mounts popped from one path before giving up
pub const MAX_STACKED_MOUNTS: usize = 16;

/// Result of a successful switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub published: PathBuf,
    pub snapshot: String,
    /// Source that was unmounted from the published path, if any
    pub previous: Option<String>,
}

/// Swaps what is mounted on the published path
pub struct MountSwitcher<'a> {
    mounts: &'a dyn MountTable,
}

impl<'a> MountSwitcher<'a> {
    pub fn new(mounts: &'a dyn MountTable) -> Self {
        Self { mounts }
    }

    /// Unmount whatever is on `published`, then mount `<volume>@<label>` there.
    ///
    /// The bind is only attempted once the path is fully unmounted, so a
    /// failed mount leaves the path empty rather than stacked.
    pub fn switch_to(
        &self,
        published: &Path,
        volume: &str,
        label: &str,
    ) -> Result<Binding, MountError> {
        let previous = self.unbind(published)?;
        let snapshot = snapshot_name(volume, label);
        self.bind(published, &snapshot)?;

        Ok(Binding {
            published: published.to_path_buf(),
            snapshot,
            previous,
        })
    }

    /// Unmount everything stacked on `published`; returns the topmost source.
    ///
    /// Gives up with [`MountError::Unmount`] if the path is still mounted
    /// after [`MAX_STACKED_MOUNTS`] successful unmounts.
    pub fn unbind(&self, published: &Path) -> Result<Option<String>, MountError> {
        let mut previous = None;

        for _ in 0..MAX_STACKED_MOUNTS {
            let source = self
                .mounts
                .mounted_source(published)
                .map_err(|source| MountError::Query {
                    path: published.to_path_buf(),
                    source,
                })?;

            let Some(source) = source else {
                if previous.is_none() {
                    debug!("{} not mounted, nothing to unbind", published.display());
                }
                return Ok(previous);
            };

            self.mounts
                .unmount(published)
                .map_err(|err| MountError::Unmount {
                    path: published.to_path_buf(),
                    source: err,
                })?;
            info!("unmounted {} from {}", source, published.display());
            previous.get_or_insert(source);
        }

        Err(MountError::Unmount {
            path: published.to_path_buf(),
            source: DriverError::Busy(format!(
                "{} still mounted after {MAX_STACKED_MOUNTS} unmounts",
                published.display()
            )),
        })
    }

    fn bind(&self, published: &Path, snapshot: &str) -> Result<(), MountError> {
        let request = MountRequest {
            device: snapshot.to_string(),
            path: published.to_path_buf(),
            fstype: SNAPSHOT_FSTYPE.to_string(),
            options: SNAPSHOT_MOUNT_OPTIONS.to_string(),
        };
        self.mounts
            .mount(&request)
            .map_err(|source| MountError::Mount {
                snapshot: snapshot.to_string(),
                path: published.to_path_buf(),
                source,
            })?;
        info!("mounted {} on {}", snapshot, published.display());
        Ok(())
    }
}
