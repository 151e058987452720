// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::RunState;

/// Failure reported by a storage, mount-table or ownership collaborator
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource busy: {0}")]
    Busy(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    /// True when the target of the call did not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound(_))
    }
}

/// Errors while making the backing volume ready
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("failed to query volume {volume}: {source}")]
    Query {
        volume: String,
        #[source]
        source: DriverError,
    },

    #[error("failed to create volume {volume}: {source}")]
    Create {
        volume: String,
        #[source]
        source: DriverError,
    },

    #[error("failed to prepare mount point {}: {source}", path.display())]
    PathSetup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to mount volume {volume} on {}: {source}", path.display())]
    Mount {
        volume: String,
        path: PathBuf,
        #[source]
        source: DriverError,
    },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to create snapshot {snapshot}: {source}")]
    Create {
        snapshot: String,
        #[source]
        source: DriverError,
    },

    /// Only raised while clearing both slots; regular sweeps downgrade this to a warning
    #[error("failed to destroy snapshot {snapshot}: {source}")]
    Destroy {
        snapshot: String,
        #[source]
        source: DriverError,
    },
}

#[derive(Error, Debug)]
pub enum MountError {
    #[error("failed to inspect mount table for {}: {source}", path.display())]
    Query {
        path: PathBuf,
        #[source]
        source: DriverError,
    },

    #[error("failed to look up mount points of {snapshot}: {source}")]
    Lookup {
        snapshot: String,
        #[source]
        source: DriverError,
    },

    #[error("failed to unmount {}: {source}", path.display())]
    Unmount {
        path: PathBuf,
        #[source]
        source: DriverError,
    },

    #[error("failed to mount {snapshot} on {}: {source}", path.display())]
    Mount {
        snapshot: String,
        path: PathBuf,
        #[source]
        source: DriverError,
    },
}

impl MountError {
    /// The collaborator failure behind this error
    pub fn into_driver_error(self) -> DriverError {
        match self {
            MountError::Query { source, .. }
            | MountError::Lookup { source, .. }
            | MountError::Unmount { source, .. }
            | MountError::Mount { source, .. } => source,
        }
    }
}

/// Invalid command line or configuration file input, detected before any run starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid flag combination: {0}")]
    InvalidFlagCombination(String),

    #[error("no pool given; use --pool or set `pool` in the configuration file")]
    MissingPool,

    #[error("the user {0} does not exist")]
    UnknownUser(String),

    #[error("the group {0} does not exist")]
    UnknownGroup(String),

    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Fatal errors of a rotation run
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("failed to fix ownership under {}: {source}", path.display())]
    Ownership {
        path: PathBuf,
        #[source]
        source: DriverError,
    },

    #[error("failed to list snapshots of {volume}: {source}")]
    Inventory {
        volume: String,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Mount(#[from] MountError),
}

/// A fatal error together with the last state the run reached
#[derive(Error, Debug)]
#[error("rotation failed after {state}: {error}")]
pub struct RunFailure {
    pub state: RunState,
    #[source]
    pub error: RunError,
}

/// Step of the retention sweep that failed for a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionStage {
    Unmount,
    Destroy,
}

impl fmt::Display for RetentionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionStage::Unmount => write!(f, "unmount"),
            RetentionStage::Destroy => write!(f, "destroy"),
        }
    }
}

/// Non-fatal, per-snapshot sweep failure; the next run retries it
#[derive(Error, Debug)]
#[error("could not {stage} stale snapshot {snapshot}: {source}")]
pub struct RetentionWarning {
    pub snapshot: String,
    pub stage: RetentionStage,
    #[source]
    pub source: DriverError,
}
