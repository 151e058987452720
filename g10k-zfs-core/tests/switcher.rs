// SPDX-License-Identifier: GPL-3.0-only

use std::cell::Cell;
use std::path::{Path, PathBuf};

use g10k_zfs_core::switcher::MAX_STACKED_MOUNTS;
use g10k_zfs_core::{DriverError, MountError, MountRequest, MountSwitcher, MountTable};
use g10k_zfs_testing::{Call, MemoryHost, Op};

const PUBLISHED: &str = "/etc/puppetlabs/code";

#[test]
fn unbinds_before_binding() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", PUBLISHED);

    let binding = MountSwitcher::new(&host)
        .switch_to(Path::new(PUBLISHED), "tank/g10k", "B")
        .expect("switch should succeed");

    assert_eq!(binding.previous.as_deref(), Some("tank/g10k@A"));
    assert_eq!(binding.snapshot, "tank/g10k@B");
    let journal = host.journal();
    let unmount = journal
        .iter()
        .position(|call| matches!(call, Call::Unmount(_)))
        .expect("unmount recorded");
    let mount = journal
        .iter()
        .position(|call| matches!(call, Call::Mount { .. }))
        .expect("mount recorded");
    assert!(unmount < mount);
    assert_eq!(
        host.source_at(Path::new(PUBLISHED)).as_deref(),
        Some("tank/g10k@B")
    );
}

#[test]
fn empty_path_is_bound_without_unmount() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A");

    let binding = MountSwitcher::new(&host)
        .switch_to(Path::new(PUBLISHED), "tank/g10k", "A")
        .expect("switch should succeed");

    assert_eq!(binding.previous, None);
    assert!(!host
        .journal()
        .iter()
        .any(|call| matches!(call, Call::Unmount(_))));
}

#[test]
fn stacked_mounts_are_all_removed_before_binding() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", PUBLISHED)
        .with_mount("tank/g10k@B", PUBLISHED);
    host.add_snapshot("tank/g10k", "C");

    let binding = MountSwitcher::new(&host)
        .switch_to(Path::new(PUBLISHED), "tank/g10k", "C")
        .expect("switch should succeed");

    assert_eq!(binding.previous.as_deref(), Some("tank/g10k@B"));
    let unmounts = host
        .journal()
        .iter()
        .filter(|call| matches!(call, Call::Unmount(_)))
        .count();
    assert_eq!(unmounts, 2);
    assert!(host.mounts_of("tank/g10k@A").is_empty());
    assert!(host.mounts_of("tank/g10k@B").is_empty());
    assert_eq!(
        host.mounts_of("tank/g10k@C"),
        vec![PathBuf::from(PUBLISHED)]
    );
}

#[test]
fn busy_unmount_prevents_bind() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", PUBLISHED);
    host.mark_busy(PUBLISHED);

    let err = MountSwitcher::new(&host)
        .switch_to(Path::new(PUBLISHED), "tank/g10k", "B")
        .expect_err("busy unmount must fail");

    assert!(matches!(err, MountError::Unmount { .. }));
    assert!(!host
        .journal()
        .iter()
        .any(|call| matches!(call, Call::Mount { .. })));
    assert_eq!(
        host.source_at(Path::new(PUBLISHED)).as_deref(),
        Some("tank/g10k@A")
    );
}

#[test]
fn failed_bind_leaves_path_unmounted() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", PUBLISHED);
    host.fail_on(Op::Mount);

    let err = MountSwitcher::new(&host)
        .switch_to(Path::new(PUBLISHED), "tank/g10k", "B")
        .expect_err("mount must fail");

    assert!(matches!(err, MountError::Mount { .. }));
    assert_eq!(host.source_at(Path::new(PUBLISHED)), None);
}

/// Mount table whose unmounts report success but never take effect
#[derive(Default)]
struct StuckMounts {
    unmounts: Cell<usize>,
}

impl MountTable for StuckMounts {
    fn mounted_source(&self, _path: &Path) -> Result<Option<String>, DriverError> {
        Ok(Some("tank/g10k@A".to_string()))
    }

    fn mount_points_of(&self, _source: &str) -> Result<Vec<PathBuf>, DriverError> {
        Ok(vec![PathBuf::from(PUBLISHED)])
    }

    fn mount(&self, _request: &MountRequest) -> Result<(), DriverError> {
        Ok(())
    }

    fn unmount(&self, _path: &Path) -> Result<(), DriverError> {
        self.unmounts.set(self.unmounts.get() + 1);
        Ok(())
    }
}

#[test]
fn unbind_gives_up_on_a_path_that_never_clears() {
    let mounts = StuckMounts::default();

    let err = MountSwitcher::new(&mounts)
        .unbind(Path::new(PUBLISHED))
        .expect_err("unbind must not loop forever");

    assert!(matches!(
        err,
        MountError::Unmount {
            source: DriverError::Busy(_),
            ..
        }
    ));
    assert_eq!(mounts.unmounts.get(), MAX_STACKED_MOUNTS);
}
