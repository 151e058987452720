// SPDX-License-Identifier: GPL-3.0-only

//! Host drivers for g10k-zfs
//!
//! Implementations of the collaborator traits from `g10k-zfs-core` for a
//! real Linux host:
//! - [`ZfsCli`] runs the `zfs` tool for dataset and snapshot operations
//! - [`ProcMountTable`] reads `/proc/self/mountinfo` and calls mount(2)
//! - [`ChownTree`] applies ownership recursively
//!
//! These operations require root privileges.

mod command;
pub mod mounts;
pub mod owner;
pub mod zfs;

pub use mounts::{MountEntry, ProcMountTable, parse_mountinfo};
pub use owner::{ChownTree, resolve_owner};
pub use zfs::ZfsCli;

/// Whether the process runs with an effective uid of root
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}
