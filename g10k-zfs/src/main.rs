// SPDX-License-Identifier: GPL-3.0-only

//! g10k-zfs - publish the latest g10k ZFS snapshot at the Puppet code directory

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use g10k_zfs_core::{Host, Orchestrator, RunReport, SystemClock};
use g10k_zfs_sys::{ChownTree, ProcMountTable, ZfsCli, resolve_owner};

mod cli;
mod logging;
mod settings;

use cli::Cli;
use settings::Settings;

/// Exit status for invalid flags or configuration
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.build {
        println!(
            "g10k-zfs version: {}, built on: {}, commit: {}",
            env!("CARGO_PKG_VERSION"),
            option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
            option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        );
        return ExitCode::SUCCESS;
    }

    let settings = match settings::load(&cli).and_then(|settings| {
        if let Some(owner) = &settings.rotation.owner {
            resolve_owner(owner)?;
        }
        Ok(settings)
    }) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("g10k-zfs: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    logging::init(settings.debug);

    match run(&settings) {
        Ok(report) => {
            if settings.debug {
                println!(
                    "published {} on {} ({} destroyed, {} warning(s))",
                    report.snapshot,
                    settings.rotation.published.display(),
                    report.destroyed.len() + report.recovered.len(),
                    report.warnings.len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("g10k-zfs: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<RunReport> {
    tracing::debug!(
        "Starting g10k-zfs v{} for {} ({} policy)",
        env!("CARGO_PKG_VERSION"),
        settings.rotation.volume.id,
        settings.rotation.policy
    );

    if !g10k_zfs_sys::is_root() {
        tracing::warn!("not running as root, zfs and mount operations will likely fail");
    }

    let zfs = ZfsCli::new().context("zfs tooling is not available")?;
    let mounts = ProcMountTable::new();
    let host = Host {
        storage: &zfs,
        mounts: &mounts,
        ownership: &ChownTree,
        clock: &SystemClock,
    };

    let report = Orchestrator::new(host, settings.rotation.clone()).run()?;
    Ok(report)
}
