// SPDX-License-Identifier: GPL-3.0-only

//! Storage collaborator backed by the `zfs` command line tool

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use g10k_zfs_core::driver::snapshot_name;
use g10k_zfs_core::{DestroyOptions, DriverError, Storage};
use tracing::{debug, info};
use which::which;

use crate::command::run_capture;

/// `zfs` CLI wrapper
pub struct ZfsCli {
    /// Path to the zfs binary
    binary_path: PathBuf,
}

impl ZfsCli {
    /// Returns an error if zfs is not installed
    pub fn new() -> Result<Self, DriverError> {
        let binary_path = which("zfs").map_err(|_| DriverError::ToolNotFound("zfs".to_string()))?;
        info!("Found zfs binary at {:?}", binary_path);
        Ok(Self { binary_path })
    }

    pub fn with_binary(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    fn zfs(&self, args: &[OsString]) -> Result<String, DriverError> {
        run_capture(&self.binary_path, args)
    }
}

fn args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}

pub(crate) fn destroy_args(id: &str, label: &str, options: DestroyOptions) -> Vec<OsString> {
    let mut list = args(["destroy"]);
    if options.defer {
        list.push("-d".into());
    }
    if options.recursive {
        list.push("-r".into());
    }
    list.push(snapshot_name(id, label).into());
    list
}

/// Labels of `id`'s snapshots from `zfs list -H -t snapshot -o name` output
pub(crate) fn parse_snapshot_labels(id: &str, output: &str) -> Vec<String> {
    let prefix = format!("{id}@");
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(&prefix))
        .filter(|label| !label.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl Storage for ZfsCli {
    fn dataset_exists(&self, id: &str) -> Result<bool, DriverError> {
        match self.zfs(&args(["list", "-H", "-o", "name", id])) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => {
                debug!("dataset {} does not exist", id);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn create_filesystem(&self, id: &str, mount_point: &Path) -> Result<(), DriverError> {
        let mut mountpoint = OsString::from("mountpoint=");
        mountpoint.push(mount_point.as_os_str());
        let mut list = args(["create", "-o"]);
        list.push(mountpoint);
        list.push(id.into());
        self.zfs(&list).map(|_| ())
    }

    fn create_snapshot(&self, id: &str, label: &str) -> Result<(), DriverError> {
        self.zfs(&args(["snapshot".to_string(), snapshot_name(id, label)]))
            .map(|_| ())
    }

    fn destroy_snapshot(
        &self,
        id: &str,
        label: &str,
        options: DestroyOptions,
    ) -> Result<(), DriverError> {
        self.zfs(&destroy_args(id, label, options)).map(|_| ())
    }

    fn mount_default(&self, id: &str) -> Result<(), DriverError> {
        self.zfs(&args(["mount", id])).map(|_| ())
    }

    fn list_snapshots(&self, id: &str) -> Result<Vec<String>, DriverError> {
        let output = self.zfs(&args([
            "list", "-H", "-t", "snapshot", "-o", "name", "-s", "createtxg", "-d", "1", id,
        ]))?;
        Ok(parse_snapshot_labels(id, &output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_of_direct_snapshots_only() {
        let output = "tank/g10k@A\ntank/g10k@Date-02-Jan-2025_Time-10.00.00\ntank/g10k2@B\n\n";
        assert_eq!(
            parse_snapshot_labels("tank/g10k", output),
            vec!["A".to_string(), "Date-02-Jan-2025_Time-10.00.00".to_string()]
        );
    }

    #[test]
    fn deferred_destroy_uses_dash_d() {
        let rendered: Vec<String> = destroy_args(
            "tank/g10k",
            "A",
            DestroyOptions {
                defer: true,
                recursive: false,
            },
        )
        .into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
        assert_eq!(rendered, vec!["destroy", "-d", "tank/g10k@A"]);
    }

    #[test]
    fn missing_binary_is_a_command_failure() {
        let zfs = ZfsCli::with_binary("/nonexistent/zfs");
        let err = zfs
            .create_snapshot("tank/g10k", "A")
            .expect_err("binary does not exist");
        assert!(matches!(err, DriverError::CommandFailed { .. }));
    }
}
