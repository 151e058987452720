// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::os::unix::fs::lchown;
use std::path::Path;

use g10k_zfs_core::{ConfigError, DriverError, OwnerSpec, Ownership};
use nix::unistd::{Gid, Group, Uid, User};
use tracing::debug;

/// Look up the numeric ids of `owner`; unknown names are configuration errors
pub fn resolve_owner(owner: &OwnerSpec) -> Result<(Uid, Gid), ConfigError> {
    let user = User::from_name(&owner.user)
        .ok()
        .flatten()
        .ok_or_else(|| ConfigError::UnknownUser(owner.user.clone()))?;
    let group = Group::from_name(&owner.group)
        .ok()
        .flatten()
        .ok_or_else(|| ConfigError::UnknownGroup(owner.group.clone()))?;
    Ok((user.uid, group.gid))
}

/// Recursive chown that never follows symlinks
#[derive(Debug, Default, Clone, Copy)]
pub struct ChownTree;

impl ChownTree {
    fn chown_recursive(path: &Path, uid: Uid, gid: Gid) -> Result<(), DriverError> {
        lchown(path, Some(uid.as_raw()), Some(gid.as_raw())).map_err(|e| {
            DriverError::PermissionDenied(format!("Failed to chown {}: {}", path.display(), e))
        })?;

        if fs::symlink_metadata(path)?.is_dir() {
            for entry in fs::read_dir(path)? {
                Self::chown_recursive(&entry?.path(), uid, gid)?;
            }
        }
        Ok(())
    }
}

impl Ownership for ChownTree {
    fn apply(&self, path: &Path, owner: &OwnerSpec) -> Result<(), DriverError> {
        let (uid, gid) =
            resolve_owner(owner).map_err(|err| DriverError::NotFound(err.to_string()))?;
        debug!(
            "fixing files ownership under {} to {}:{}",
            path.display(),
            owner.user,
            owner.group
        );
        Self::chown_recursive(path, uid, gid)
    }
}
