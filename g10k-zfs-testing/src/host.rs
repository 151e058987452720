// SPDX-License-Identifier: GPL-3.0-only

//! In-memory storage, mount table and ownership backend.
//!
//! Every collaborator call is appended to a journal so tests can assert on
//! ordering, and any mutating operation can be made to fail on demand.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use g10k_zfs_core::driver::snapshot_name;
use g10k_zfs_core::{
    DestroyOptions, DriverError, MountRequest, MountTable, OwnerSpec, Ownership, Storage,
};

/// A recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DatasetExists(String),
    CreateFilesystem(String),
    CreateSnapshot(String),
    DestroySnapshot(String),
    MountDefault(String),
    ListSnapshots(String),
    MountedSource(PathBuf),
    MountPointsOf(String),
    Mount { device: String, path: PathBuf },
    Unmount(PathBuf),
    Chown(PathBuf),
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateFilesystem,
    CreateSnapshot,
    DestroySnapshot,
    MountDefault,
    ListSnapshots,
    MountPointsOf,
    Mount,
    Unmount,
    Chown,
}

#[derive(Debug)]
struct Dataset {
    mount_point: PathBuf,
    snapshots: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    datasets: BTreeMap<String, Dataset>,
    /// (source, mount point) in mount order
    mounts: Vec<(String, PathBuf)>,
    journal: Vec<Call>,
    failures: HashSet<Op>,
    busy: HashSet<PathBuf>,
}

impl State {
    fn check(&self, op: Op) -> Result<(), DriverError> {
        if self.failures.contains(&op) {
            Err(DriverError::PermissionDenied(format!("injected {op:?} failure")))
        } else {
            Ok(())
        }
    }

    fn snapshot_exists(&self, name: &str) -> bool {
        name.split_once('@').is_some_and(|(id, label)| {
            self.datasets
                .get(id)
                .is_some_and(|dataset| dataset.snapshots.iter().any(|l| l == label))
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    state: RefCell<State>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, id: &str, mount_point: impl AsRef<Path>) -> Self {
        self.state.borrow_mut().datasets.insert(
            id.to_string(),
            Dataset {
                mount_point: mount_point.as_ref().to_path_buf(),
                snapshots: Vec::new(),
            },
        );
        self
    }

    pub fn with_snapshot(self, id: &str, label: &str) -> Self {
        self.add_snapshot(id, label);
        self
    }

    pub fn with_mount(self, source: &str, path: impl AsRef<Path>) -> Self {
        self.state
            .borrow_mut()
            .mounts
            .push((source.to_string(), path.as_ref().to_path_buf()));
        self
    }

    /// Add a snapshot behind the caller's back, without journaling it
    pub fn add_snapshot(&self, id: &str, label: &str) {
        let mut state = self.state.borrow_mut();
        let dataset = state
            .datasets
            .entry(id.to_string())
            .or_insert_with(|| Dataset {
                mount_point: PathBuf::from("/").join(id),
                snapshots: Vec::new(),
            });
        dataset.snapshots.push(label.to_string());
    }

    pub fn fail_on(&self, op: Op) {
        self.state.borrow_mut().failures.insert(op);
    }

    /// Make unmounting `path` fail as if a process held it open
    pub fn mark_busy(&self, path: impl AsRef<Path>) {
        self.state
            .borrow_mut()
            .busy
            .insert(path.as_ref().to_path_buf());
    }

    pub fn journal(&self) -> Vec<Call> {
        self.state.borrow().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.borrow_mut().journal.clear();
    }

    pub fn dataset_exists_now(&self, id: &str) -> bool {
        self.state.borrow().datasets.contains_key(id)
    }

    /// Snapshot labels of `id` in creation order
    pub fn snapshots(&self, id: &str) -> Vec<String> {
        self.state
            .borrow()
            .datasets
            .get(id)
            .map(|dataset| dataset.snapshots.clone())
            .unwrap_or_default()
    }

    /// Topmost source mounted on `path`
    pub fn source_at(&self, path: &Path) -> Option<String> {
        self.state
            .borrow()
            .mounts
            .iter()
            .rev()
            .find(|(_, mounted)| mounted == path)
            .map(|(source, _)| source.clone())
    }

    /// Every mount point `source` is mounted on
    pub fn mounts_of(&self, source: &str) -> Vec<PathBuf> {
        self.state
            .borrow()
            .mounts
            .iter()
            .filter(|(mounted, _)| mounted == source)
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().journal.push(call);
    }
}

impl Storage for MemoryHost {
    fn dataset_exists(&self, id: &str) -> Result<bool, DriverError> {
        self.record(Call::DatasetExists(id.to_string()));
        Ok(self.dataset_exists_now(id))
    }

    fn create_filesystem(&self, id: &str, mount_point: &Path) -> Result<(), DriverError> {
        self.record(Call::CreateFilesystem(id.to_string()));
        let mut state = self.state.borrow_mut();
        state.check(Op::CreateFilesystem)?;
        if state.datasets.contains_key(id) {
            return Err(DriverError::AlreadyExists(id.to_string()));
        }
        state.datasets.insert(
            id.to_string(),
            Dataset {
                mount_point: mount_point.to_path_buf(),
                snapshots: Vec::new(),
            },
        );
        Ok(())
    }

    fn create_snapshot(&self, id: &str, label: &str) -> Result<(), DriverError> {
        let name = snapshot_name(id, label);
        self.record(Call::CreateSnapshot(name.clone()));
        let mut state = self.state.borrow_mut();
        state.check(Op::CreateSnapshot)?;
        let dataset = state
            .datasets
            .get_mut(id)
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
        if dataset.snapshots.iter().any(|existing| existing == label) {
            return Err(DriverError::AlreadyExists(name));
        }
        dataset.snapshots.push(label.to_string());
        Ok(())
    }

    fn destroy_snapshot(
        &self,
        id: &str,
        label: &str,
        _options: DestroyOptions,
    ) -> Result<(), DriverError> {
        let name = snapshot_name(id, label);
        self.record(Call::DestroySnapshot(name.clone()));
        let mut state = self.state.borrow_mut();
        state.check(Op::DestroySnapshot)?;
        if !state.snapshot_exists(&name) {
            return Err(DriverError::NotFound(name));
        }
        if state.mounts.iter().any(|(source, _)| *source == name) {
            return Err(DriverError::Busy(format!("{name} is mounted")));
        }
        if let Some(dataset) = state.datasets.get_mut(id) {
            dataset.snapshots.retain(|existing| existing != label);
        }
        Ok(())
    }

    fn mount_default(&self, id: &str) -> Result<(), DriverError> {
        self.record(Call::MountDefault(id.to_string()));
        let mut state = self.state.borrow_mut();
        state.check(Op::MountDefault)?;
        let mount_point = state
            .datasets
            .get(id)
            .map(|dataset| dataset.mount_point.clone())
            .ok_or_else(|| DriverError::NotFound(id.to_string()))?;
        if state.mounts.iter().any(|(source, _)| source == id) {
            return Err(DriverError::Busy(format!("{id} already mounted")));
        }
        state.mounts.push((id.to_string(), mount_point));
        Ok(())
    }

    fn list_snapshots(&self, id: &str) -> Result<Vec<String>, DriverError> {
        self.record(Call::ListSnapshots(id.to_string()));
        let state = self.state.borrow();
        state.check(Op::ListSnapshots)?;
        state
            .datasets
            .get(id)
            .map(|dataset| dataset.snapshots.clone())
            .ok_or_else(|| DriverError::NotFound(id.to_string()))
    }
}

impl MountTable for MemoryHost {
    fn mounted_source(&self, path: &Path) -> Result<Option<String>, DriverError> {
        self.record(Call::MountedSource(path.to_path_buf()));
        Ok(self.source_at(path))
    }

    fn mount_points_of(&self, source: &str) -> Result<Vec<PathBuf>, DriverError> {
        self.record(Call::MountPointsOf(source.to_string()));
        self.state.borrow().check(Op::MountPointsOf)?;
        Ok(self.mounts_of(source))
    }

    fn mount(&self, request: &MountRequest) -> Result<(), DriverError> {
        self.record(Call::Mount {
            device: request.device.clone(),
            path: request.path.clone(),
        });
        let mut state = self.state.borrow_mut();
        state.check(Op::Mount)?;
        let exists = if request.device.contains('@') {
            state.snapshot_exists(&request.device)
        } else {
            state.datasets.contains_key(&request.device)
        };
        if !exists {
            return Err(DriverError::NotFound(request.device.clone()));
        }
        if state.mounts.iter().any(|(_, path)| *path == request.path) {
            return Err(DriverError::Busy(format!(
                "{} already has a mount",
                request.path.display()
            )));
        }
        state
            .mounts
            .push((request.device.clone(), request.path.clone()));
        Ok(())
    }

    fn unmount(&self, path: &Path) -> Result<(), DriverError> {
        self.record(Call::Unmount(path.to_path_buf()));
        let mut state = self.state.borrow_mut();
        state.check(Op::Unmount)?;
        if state.busy.contains(path) {
            return Err(DriverError::Busy(path.display().to_string()));
        }
        let index = state
            .mounts
            .iter()
            .rposition(|(_, mounted)| mounted == path)
            .ok_or_else(|| DriverError::NotFound(format!("{} not mounted", path.display())))?;
        state.mounts.remove(index);
        Ok(())
    }
}

impl Ownership for MemoryHost {
    fn apply(&self, path: &Path, _owner: &OwnerSpec) -> Result<(), DriverError> {
        self.record(Call::Chown(path.to_path_buf()));
        self.state.borrow().check(Op::Chown)
    }
}
