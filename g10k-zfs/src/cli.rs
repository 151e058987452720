// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use g10k_zfs_core::RotationPolicy;

/// Publish a fresh read-only ZFS snapshot of the g10k volume
///
/// Creates a snapshot of the g10k dataset, unmounts the snapshot currently
/// mounted on the Puppet code directory, mounts the new one there and
/// destroys the snapshots that are no longer needed.
#[derive(Parser, Debug)]
#[command(name = "g10k-zfs", version, disable_version_flag = true)]
pub struct Cli {
    /// ZFS pool holding the g10k dataset
    #[arg(short, long)]
    pub pool: Option<String>,

    /// Puppet code mount point [default: /etc/puppetlabs/code]
    #[arg(short, long)]
    pub mountpoint: Option<PathBuf>,

    /// G10k mount point [default: /g10k]
    #[arg(short = 'k', long = "g10k-mount")]
    pub g10k_mount: Option<PathBuf>,

    /// Snapshot rotation policy [default: timestamp]
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Whether to fix file ownership
    #[arg(short, long)]
    pub fix_owner: bool,

    /// Files owner [default: puppet]
    #[arg(short, long)]
    pub owner: Option<String>,

    /// Files group [default: puppet]
    #[arg(short, long)]
    pub group: Option<String>,

    /// TOML configuration file; command line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print messages to the console
    #[arg(short, long)]
    pub debug: bool,

    /// Print version and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Print version and build information and exit
    #[arg(short, long)]
    pub build: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// New timestamped snapshot each run, older ones destroyed
    Timestamp,
    /// Alternate between snapshots A and B
    TwoSlot,
}

impl From<PolicyArg> for RotationPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Timestamp => RotationPolicy::Timestamp,
            PolicyArg::TwoSlot => RotationPolicy::TwoSlot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let cli = Cli::try_parse_from([
            "g10k-zfs", "-p", "tank", "-m", "/srv/code", "-k", "/srv/g10k", "-f", "-o", "www",
            "-g", "www", "-d",
        ])
        .expect("valid arguments");

        assert_eq!(cli.pool.as_deref(), Some("tank"));
        assert_eq!(cli.mountpoint, Some(PathBuf::from("/srv/code")));
        assert_eq!(cli.g10k_mount, Some(PathBuf::from("/srv/g10k")));
        assert!(cli.fix_owner);
        assert_eq!(cli.owner.as_deref(), Some("www"));
        assert!(cli.debug);
    }

    #[test]
    fn parses_policy_names() {
        let cli = Cli::try_parse_from(["g10k-zfs", "--pool=tank", "--policy=two-slot"])
            .expect("valid arguments");
        assert_eq!(cli.policy.map(RotationPolicy::from), Some(RotationPolicy::TwoSlot));
    }

    #[test]
    fn version_flag_exits_early() {
        let err = Cli::try_parse_from(["g10k-zfs", "-v"]).expect_err("version short-circuits");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
