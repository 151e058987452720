// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles for g10k-zfs
//!
//! [`MemoryHost`] implements the storage, mount table and ownership
//! collaborators in memory, journals every call and can fail on demand.
//! [`ManualClock`] drives timestamp labels deterministically.

pub mod clock;
pub mod host;
pub mod temp;

pub use clock::ManualClock;
pub use host::{Call, MemoryHost, Op};
pub use temp::TempDir;
