// SPDX-License-Identifier: GPL-3.0-only

//! Mount table collaborator backed by `/proc/self/mountinfo` and mount(2)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use g10k_zfs_core::{DriverError, MountRequest, MountTable};
use nix::errno::Errno;
use nix::mount::{MsFlags, mount, umount};
use tracing::debug;

const MOUNTINFO: &str = "/proc/self/mountinfo";

/// One line of mountinfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub mount_point: PathBuf,
    pub fstype: String,
}

pub fn parse_mountinfo(input: &str) -> Result<Vec<MountEntry>, DriverError> {
    let mut entries = Vec::new();

    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let invalid = || DriverError::Parse(format!("invalid mountinfo line: {line}"));
        let (left, right) = line.split_once(" - ").ok_or_else(invalid)?;

        let mount_point = left.split_whitespace().nth(4).ok_or_else(invalid)?;

        let mut right_fields = right.split_whitespace();
        let fstype = right_fields.next().ok_or_else(invalid)?;
        let source = right_fields.next().ok_or_else(invalid)?;

        entries.push(MountEntry {
            source: unescape_mount_field(source),
            mount_point: PathBuf::from(unescape_mount_field(mount_point)),
            fstype: fstype.to_string(),
        });
    }

    Ok(entries)
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = Vec::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1].is_ascii_digit()
            && bytes[index + 2].is_ascii_digit()
            && bytes[index + 3].is_ascii_digit()
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(num) = u8::from_str_radix(octal, 8) {
                output.push(num);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}

/// Translate an fstab-style option string into mount flags and filesystem data
pub fn parse_mount_options(options: &str) -> (MsFlags, Option<String>) {
    let mut flags = MsFlags::empty();
    let mut data = Vec::new();

    for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        match option {
            "defaults" | "rw" => {}
            "ro" => flags |= MsFlags::MS_RDONLY,
            "noatime" => flags |= MsFlags::MS_NOATIME,
            "nodev" => flags |= MsFlags::MS_NODEV,
            "noexec" => flags |= MsFlags::MS_NOEXEC,
            "nosuid" => flags |= MsFlags::MS_NOSUID,
            other => data.push(other),
        }
    }

    let data = if data.is_empty() {
        None
    } else {
        Some(data.join(","))
    };
    (flags, data)
}

fn errno_error(errno: Errno, context: String) -> DriverError {
    match errno {
        Errno::EBUSY => DriverError::Busy(context),
        Errno::EPERM | Errno::EACCES => DriverError::PermissionDenied(context),
        Errno::ENOENT => DriverError::NotFound(context),
        other => DriverError::Io(io::Error::other(format!("{context}: {other}"))),
    }
}

/// umount(2) reports `EINVAL` for a path that is not a mount point
fn umount_error(errno: Errno, path: &Path) -> DriverError {
    match errno {
        Errno::EINVAL => DriverError::NotFound(format!("{} is not mounted", path.display())),
        other => errno_error(other, format!("umount {}", path.display())),
    }
}

/// Kernel mount table of the current mount namespace
pub struct ProcMountTable {
    mountinfo: PathBuf,
}

impl Default for ProcMountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcMountTable {
    pub fn new() -> Self {
        Self {
            mountinfo: PathBuf::from(MOUNTINFO),
        }
    }

    /// Read mounts from another mountinfo file
    pub fn with_mountinfo(path: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: path.into(),
        }
    }

    fn entries(&self) -> Result<Vec<MountEntry>, DriverError> {
        let content = fs::read_to_string(&self.mountinfo)?;
        parse_mountinfo(&content)
    }
}

impl MountTable for ProcMountTable {
    fn mounted_source(&self, path: &Path) -> Result<Option<String>, DriverError> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        debug!("Checking if {:?} is mounted", canonical);

        Ok(self
            .entries()?
            .into_iter()
            .rev()
            .find(|entry| entry.mount_point == canonical)
            .map(|entry| entry.source))
    }

    fn mount_points_of(&self, source: &str) -> Result<Vec<PathBuf>, DriverError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| entry.source == source)
            .map(|entry| entry.mount_point)
            .collect())
    }

    fn mount(&self, request: &MountRequest) -> Result<(), DriverError> {
        let (flags, data) = parse_mount_options(&request.options);
        mount(
            Some(request.device.as_str()),
            request.path.as_path(),
            Some(request.fstype.as_str()),
            flags,
            data.as_deref(),
        )
        .map_err(|errno| {
            errno_error(
                errno,
                format!("mount {} on {}", request.device, request.path.display()),
            )
        })
    }

    fn unmount(&self, path: &Path) -> Result<(), DriverError> {
        umount(path).map_err(|errno| umount_error(errno, path))
    }
}
