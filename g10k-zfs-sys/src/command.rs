// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use g10k_zfs_core::DriverError;
use tracing::debug;

pub(crate) fn render<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.as_ref().to_string_lossy());
    }
    rendered
}

/// Run `program` and return its stdout, or a [`DriverError`] classified from stderr
pub(crate) fn run_capture<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> Result<String, DriverError> {
    let rendered = render(program, args);
    debug!("running {}", rendered);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| DriverError::CommandFailed {
            command: rendered.clone(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(classify(rendered, stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Map well-known zfs error messages onto the collaborator error kinds
pub(crate) fn classify(command: String, stderr: String) -> DriverError {
    let lower = stderr.to_lowercase();
    if lower.contains("already exists") {
        DriverError::AlreadyExists(stderr)
    } else if lower.contains("does not exist")
        || lower.contains("could not find any snapshots")
        || lower.contains("not currently mounted")
    {
        DriverError::NotFound(stderr)
    } else if lower.contains("busy") {
        DriverError::Busy(stderr)
    } else if lower.contains("permission denied") || lower.contains("operation not permitted") {
        DriverError::PermissionDenied(stderr)
    } else {
        DriverError::CommandFailed { command, stderr }
    }
}
