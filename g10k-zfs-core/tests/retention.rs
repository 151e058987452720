// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use g10k_zfs_core::error::RetentionStage;
use g10k_zfs_core::retention::stale_entries;
use g10k_zfs_core::{
    DriverError, Inventory, MountError, RetentionEnforcer, RotationPolicy, RunError,
    SnapshotInventory, VolumeSpec,
};
use g10k_zfs_testing::{Call, MemoryHost, Op};

const PUBLISHED: &str = "/etc/puppetlabs/code";

fn volume() -> VolumeSpec {
    VolumeSpec {
        id: "tank/g10k".to_string(),
        mount_point: PathBuf::from("/g10k"),
    }
}

fn scan(host: &MemoryHost, policy: RotationPolicy) -> Inventory {
    SnapshotInventory::new(host, host)
        .scan(&volume(), policy)
        .expect("scan should succeed")
}

#[test]
fn two_slot_sweep_targets_only_the_other_slot() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B");
    let inventory = scan(&host, RotationPolicy::TwoSlot);

    let stale: Vec<&str> = stale_entries(&inventory, "B")
        .iter()
        .map(|entry| entry.label.as_str())
        .collect();
    assert_eq!(stale, vec!["A"]);
}

#[test]
fn timestamp_sweep_destroys_every_older_snapshot() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "Date-01-Jan-2025_Time-10.00.00")
        .with_snapshot("tank/g10k", "Date-01-Jan-2025_Time-11.00.00")
        .with_snapshot("tank/g10k", "keep-me");
    let inventory = scan(&host, RotationPolicy::Timestamp);
    host.add_snapshot("tank/g10k", "Date-01-Jan-2025_Time-12.00.00");

    let outcome = RetentionEnforcer::new(&host, &host).sweep(
        &volume(),
        &inventory,
        "Date-01-Jan-2025_Time-12.00.00",
    );

    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.destroyed.len(), 2);
    assert_eq!(
        host.snapshots("tank/g10k"),
        vec![
            "keep-me".to_string(),
            "Date-01-Jan-2025_Time-12.00.00".to_string()
        ]
    );
}

#[test]
fn mounted_snapshot_is_unmounted_before_destroy() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", "/mnt/inspect");
    let inventory = scan(&host, RotationPolicy::TwoSlot);
    host.clear_journal();

    let outcome = RetentionEnforcer::new(&host, &host).sweep(&volume(), &inventory, "B");

    assert_eq!(outcome.destroyed, vec!["tank/g10k@A".to_string()]);
    let journal = host.journal();
    let unmount = journal
        .iter()
        .position(|call| *call == Call::Unmount(PathBuf::from("/mnt/inspect")))
        .expect("unmount recorded");
    let destroy = journal
        .iter()
        .position(|call| *call == Call::DestroySnapshot("tank/g10k@A".to_string()))
        .expect("destroy recorded");
    assert!(unmount < destroy);
}

#[test]
fn covered_snapshot_is_not_unmounted_from_under_another_mount() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", PUBLISHED)
        .with_mount("tank/g10k@B", PUBLISHED);
    let inventory = scan(&host, RotationPolicy::TwoSlot);
    host.clear_journal();

    let outcome = RetentionEnforcer::new(&host, &host).sweep(&volume(), &inventory, "B");

    assert!(outcome.destroyed.is_empty());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].stage, RetentionStage::Unmount);
    assert!(!host
        .journal()
        .iter()
        .any(|call| matches!(call, Call::Unmount(_))));
    assert_eq!(
        host.source_at(Path::new(PUBLISHED)).as_deref(),
        Some("tank/g10k@B")
    );
}

#[test]
fn busy_snapshot_is_skipped_with_a_warning() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", "/mnt/inspect");
    host.mark_busy("/mnt/inspect");
    let inventory = scan(&host, RotationPolicy::TwoSlot);

    let outcome = RetentionEnforcer::new(&host, &host).sweep(&volume(), &inventory, "B");

    assert!(outcome.destroyed.is_empty());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].stage, RetentionStage::Unmount);
    assert!(!host
        .journal()
        .iter()
        .any(|call| matches!(call, Call::DestroySnapshot(_))));
    assert!(host.snapshots("tank/g10k").contains(&"A".to_string()));
}

#[test]
fn destroy_failures_do_not_stop_the_sweep() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "Date-01-Jan-2025_Time-10.00.00")
        .with_snapshot("tank/g10k", "Date-01-Jan-2025_Time-11.00.00");
    let inventory = scan(&host, RotationPolicy::Timestamp);
    host.fail_on(Op::DestroySnapshot);

    let outcome = RetentionEnforcer::new(&host, &host).sweep(
        &volume(),
        &inventory,
        "Date-01-Jan-2025_Time-12.00.00",
    );

    assert_eq!(outcome.warnings.len(), 2);
    assert!(outcome
        .warnings
        .iter()
        .all(|warning| warning.stage == RetentionStage::Destroy));
}

#[test]
fn clearing_slots_is_idempotent() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@B", PUBLISHED);
    let inventory = scan(&host, RotationPolicy::TwoSlot);
    let enforcer = RetentionEnforcer::new(&host, &host);

    let first = enforcer
        .clear_slots(&volume(), Path::new(PUBLISHED), &inventory)
        .expect("first clear should succeed");
    assert_eq!(first.len(), 2);
    assert!(host.snapshots("tank/g10k").is_empty());
    assert_eq!(host.source_at(Path::new(PUBLISHED)), None);

    let second = enforcer
        .clear_slots(&volume(), Path::new(PUBLISHED), &inventory)
        .expect("repeated clear should be a no-op");
    assert!(second.is_empty());
}

#[test]
fn clearing_slots_empties_a_stacked_published_path() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B")
        .with_mount("tank/g10k@A", PUBLISHED)
        .with_mount("tank/g10k@B", PUBLISHED);
    let inventory = scan(&host, RotationPolicy::TwoSlot);

    let destroyed = RetentionEnforcer::new(&host, &host)
        .clear_slots(&volume(), Path::new(PUBLISHED), &inventory)
        .expect("clear should succeed");

    assert_eq!(destroyed.len(), 2);
    assert_eq!(host.source_at(Path::new(PUBLISHED)), None);
    assert!(host.snapshots("tank/g10k").is_empty());
}

#[test]
fn mount_lookup_failure_names_the_snapshot() {
    let host = MemoryHost::new()
        .with_dataset("tank/g10k", "/g10k")
        .with_snapshot("tank/g10k", "A")
        .with_snapshot("tank/g10k", "B");
    let inventory = scan(&host, RotationPolicy::TwoSlot);
    host.fail_on(Op::MountPointsOf);

    let err = RetentionEnforcer::new(&host, &host)
        .clear_slots(&volume(), Path::new(PUBLISHED), &inventory)
        .expect_err("lookup failure must be fatal");

    match &err {
        RunError::Mount(MountError::Lookup { snapshot, source }) => {
            assert_eq!(snapshot, "tank/g10k@A");
            assert!(matches!(source, DriverError::PermissionDenied(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "failed to look up mount points of tank/g10k@A: Permission denied: injected MountPointsOf failure"
    );
    assert_eq!(host.snapshots("tank/g10k").len(), 2);
}
