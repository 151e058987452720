// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot rotation and mount switching for the g10k ZFS volume
//!
//! Each run makes sure the backing dataset exists and is mounted, takes a
//! new read-only snapshot, swaps the snapshot mounted on the published path
//! and destroys the snapshots the active [`RotationPolicy`] considers stale.
//! Storage, mount table and ownership are reached through the traits in
//! [`driver`] so the orchestration can run against an in-memory host in tests.

pub mod driver;
pub mod error;
pub mod inventory;
pub mod namer;
pub mod orchestrator;
pub mod policy;
pub mod retention;
pub mod switcher;
pub mod volume;

// Re-export commonly used types
pub use driver::{DestroyOptions, MountRequest, MountTable, OwnerSpec, Ownership, Storage};
pub use error::{
    ConfigError, DriverError, MountError, RetentionWarning, RunError, RunFailure, SnapshotError,
    VolumeError,
};
pub use inventory::{Inventory, SnapshotEntry, SnapshotInventory};
pub use namer::{Clock, SnapshotNamer, SystemClock};
pub use orchestrator::{Host, Orchestrator, RotationConfig, RunReport, RunState};
pub use policy::{RotationPolicy, Slot};
pub use retention::RetentionEnforcer;
pub use switcher::MountSwitcher;
pub use volume::{VolumeLifecycle, VolumeSpec, VolumeStatus};
