// SPDX-License-Identifier: GPL-3.0-only

//! Merge of the optional TOML configuration file and the command line

use std::path::{Path, PathBuf};

use g10k_zfs_core::{ConfigError, OwnerSpec, RotationConfig, RotationPolicy, VolumeSpec};
use serde::Deserialize;

pub const DEFAULT_MOUNTPOINT: &str = "/etc/puppetlabs/code";
pub const DEFAULT_G10K_MOUNT: &str = "/g10k";
pub const DEFAULT_OWNER: &str = "puppet";
pub const DEFAULT_GROUP: &str = "puppet";

use crate::cli::Cli;

/// Values accepted in the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub pool: Option<String>,
    pub mountpoint: Option<PathBuf>,
    pub g10k_mount: Option<PathBuf>,
    pub policy: Option<RotationPolicy>,
    pub fix_owner: Option<bool>,
    pub owner: Option<String>,
    pub group: Option<String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Validated settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub rotation: RotationConfig,
    pub debug: bool,
}

/// Read the configuration file named on the command line, if any, and merge
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    let file = match &cli.config {
        Some(path) => FileConfig::read(path)?,
        None => FileConfig::default(),
    };
    resolve(cli, file)
}

/// Command line values win over file values, which win over defaults
pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Settings, ConfigError> {
    let pool = cli
        .pool
        .clone()
        .or(file.pool)
        .filter(|pool| !pool.trim().is_empty())
        .ok_or(ConfigError::MissingPool)?;
    let published = cli
        .mountpoint
        .clone()
        .or(file.mountpoint)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNTPOINT));
    let g10k_mount = cli
        .g10k_mount
        .clone()
        .or(file.g10k_mount)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_G10K_MOUNT));
    let policy = cli
        .policy
        .map(RotationPolicy::from)
        .or(file.policy)
        .unwrap_or_default();

    let fix_owner = cli.fix_owner || file.fix_owner.unwrap_or(false);
    let user = cli
        .owner
        .clone()
        .or(file.owner)
        .unwrap_or_else(|| DEFAULT_OWNER.to_string());
    let group = cli
        .group
        .clone()
        .or(file.group)
        .unwrap_or_else(|| DEFAULT_GROUP.to_string());

    let owner = if fix_owner {
        Some(OwnerSpec { user, group })
    } else if user != DEFAULT_OWNER || group != DEFAULT_GROUP {
        return Err(ConfigError::InvalidFlagCombination(
            "you have set either owner or group without using --fix-owner".to_string(),
        ));
    } else {
        None
    };

    Ok(Settings {
        rotation: RotationConfig {
            volume: VolumeSpec::in_pool(&pool, g10k_mount),
            published,
            policy,
            owner,
        },
        debug: cli.debug,
    })
}
