// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::driver::{MountTable, OwnerSpec, Ownership, Storage, snapshot_name};
use crate::error::{MountError, RetentionWarning, RunError, RunFailure, SnapshotError};
use crate::inventory::{Inventory, SnapshotInventory};
use crate::namer::{Clock, SnapshotNamer};
use crate::policy::RotationPolicy;
use crate::retention::RetentionEnforcer;
use crate::switcher::MountSwitcher;
use crate::volume::{VolumeLifecycle, VolumeSpec, VolumeStatus};

/// Everything one rotation run needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    pub volume: VolumeSpec,
    /// Path consumers read from; exactly one snapshot is mounted here
    pub published: PathBuf,
    pub policy: RotationPolicy,
    /// Ownership applied to the volume mount point once it is ready
    pub owner: Option<OwnerSpec>,
}

/// Collaborators used by a run
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub storage: &'a dyn Storage,
    pub mounts: &'a dyn MountTable,
    pub ownership: &'a dyn Ownership,
    pub clock: &'a dyn Clock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    VolumeReady,
    Inventoried,
    Named,
    SnapshotCreated,
    Unbound,
    Bound,
    Swept,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::VolumeReady => "volume ready",
            RunState::Inventoried => "inventory",
            RunState::Named => "naming",
            RunState::SnapshotCreated => "snapshot creation",
            RunState::Unbound => "unmount",
            RunState::Bound => "mount",
            RunState::Swept => "retention sweep",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of a successful run
#[derive(Debug)]
pub struct RunReport {
    pub volume: VolumeStatus,
    pub label: String,
    /// `<volume>@<label>` now mounted on the published path
    pub snapshot: String,
    /// Source that was unmounted from the published path
    pub previous: Option<String>,
    /// Snapshots destroyed while clearing both slots
    pub recovered: Vec<String>,
    pub destroyed: Vec<String>,
    pub warnings: Vec<RetentionWarning>,
    pub states: Vec<RunState>,
}

struct Progress {
    states: Vec<RunState>,
}

impl Progress {
    fn new() -> Self {
        Self {
            states: vec![RunState::Init],
        }
    }

    fn current(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Init)
    }

    fn advance(&mut self, state: RunState) {
        debug!("{} -> {}", self.current(), state);
        self.states.push(state);
    }

    fn fail(&self, error: impl Into<RunError>) -> RunFailure {
        RunFailure {
            state: self.current(),
            error: error.into(),
        }
    }
}

/// Sequences one rotation: ensure, inventory, name, create, switch, sweep
pub struct Orchestrator<'a> {
    host: Host<'a>,
    config: RotationConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(host: Host<'a>, config: RotationConfig) -> Self {
        Self { host, config }
    }

    /// Run the rotation to completion or to the first fatal error
    pub fn run(&self) -> Result<RunReport, RunFailure> {
        let Host {
            storage,
            mounts,
            ownership,
            clock,
        } = self.host;
        let config = &self.config;
        let volume = &config.volume;
        let mut progress = Progress::new();

        let volume_status = VolumeLifecycle::new(storage, mounts)
            .ensure(volume)
            .map_err(|err| progress.fail(err))?;
        progress.advance(RunState::VolumeReady);

        if let Some(owner) = &config.owner {
            debug!("fixing files ownership under {}", volume.mount_point.display());
            ownership
                .apply(&volume.mount_point, owner)
                .map_err(|source| {
                    progress.fail(RunError::Ownership {
                        path: volume.mount_point.clone(),
                        source,
                    })
                })?;
        }

        let mut inventory = SnapshotInventory::new(storage, mounts)
            .scan(volume, config.policy)
            .map_err(|source| {
                progress.fail(RunError::Inventory {
                    volume: volume.id.clone(),
                    source,
                })
            })?;
        progress.advance(RunState::Inventoried);

        let retention = RetentionEnforcer::new(storage, mounts);
        let namer = SnapshotNamer::new(clock);
        let mut naming = namer.next(&inventory);
        let mut recovered = Vec::new();
        if naming.anomaly {
            recovered = retention
                .clear_slots(volume, &config.published, &inventory)
                .map_err(|err| progress.fail(err))?;
            inventory = Inventory::empty(config.policy);
            naming = namer.next(&inventory);
        }
        progress.advance(RunState::Named);

        let snapshot = snapshot_name(&volume.id, &naming.label);
        storage
            .create_snapshot(&volume.id, &naming.label)
            .map_err(|source| {
                progress.fail(SnapshotError::Create {
                    snapshot: snapshot.clone(),
                    source,
                })
            })?;
        info!("created snapshot {}", snapshot);
        progress.advance(RunState::SnapshotCreated);

        let binding = MountSwitcher::new(mounts)
            .switch_to(&config.published, &volume.id, &naming.label)
            .map_err(|err| {
                let mut failure = progress.fail(RunError::Mount(err));
                if matches!(failure.error, RunError::Mount(MountError::Mount { .. })) {
                    failure.state = RunState::Unbound;
                }
                failure
            })?;
        progress.advance(RunState::Unbound);
        progress.advance(RunState::Bound);

        let outcome = retention.sweep(volume, &inventory, &naming.label);
        progress.advance(RunState::Swept);
        progress.advance(RunState::Done);

        info!(
            "{} published on {} ({} stale snapshot(s) destroyed, {} warning(s))",
            binding.snapshot,
            binding.published.display(),
            outcome.destroyed.len(),
            outcome.warnings.len()
        );

        Ok(RunReport {
            volume: volume_status,
            label: naming.label,
            snapshot: binding.snapshot,
            previous: binding.previous,
            recovered,
            destroyed: outcome.destroyed,
            warnings: outcome.warnings,
            states: progress.states,
        })
    }
}
