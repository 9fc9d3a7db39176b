// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable on-disk lease bookkeeping.
//!
//! Every write goes through the same tmp-write → fsync → rename →
//! fsync-parent-dir sequence used elsewhere in this codebase for durable
//! state, so a crash mid-write never leaves a half-written lease file behind.
//! All I/O runs through the [`LeaseWriter`] trait so the store's reconcile
//! logic can be tested against [`FakeLeaseWriter`] without touching a real
//! filesystem.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tsk_core::lease::Lease;

#[derive(Debug, Error)]
pub enum LeaseStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("lease already exists for task {0}")]
    AlreadyExists(String),
    #[error("lease does not exist for task {0}")]
    NotFound(String),
}

/// Abstracts the filesystem operations a lease write needs, so the atomic
/// write sequence can be exercised without a real disk.
pub trait LeaseWriter: Send + Sync + 'static {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), LeaseStoreError>;
    fn fsync_file(&self, path: &Path) -> Result<(), LeaseStoreError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), LeaseStoreError>;
    fn fsync_dir(&self, path: &Path) -> Result<(), LeaseStoreError>;
    fn remove(&self, path: &Path) -> Result<(), LeaseStoreError>;
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, LeaseStoreError>;
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, LeaseStoreError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), LeaseStoreError>;
}

/// Production writer using real filesystem operations.
#[derive(Clone, Default)]
pub struct FsLeaseWriter;

impl LeaseWriter for FsLeaseWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), LeaseStoreError> {
        let mut file = File::create(path)?;
        file.write_all(data)?;
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), LeaseStoreError> {
        File::open(path)?.sync_all()?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), LeaseStoreError> {
        std::fs::rename(from, to)?;
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), LeaseStoreError> {
        File::open(path)?.sync_all()?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), LeaseStoreError> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, LeaseStoreError> {
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, LeaseStoreError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_lease_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("task_") && n.ends_with(".json"));
            if is_lease_file {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), LeaseStoreError> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }
}

/// In-memory writer for deterministic tests of the atomic write sequence
/// and reclaim logic, without a real filesystem.
#[derive(Default)]
pub struct FakeLeaseWriter {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl FakeLeaseWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseWriter for FakeLeaseWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), LeaseStoreError> {
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn fsync_file(&self, _path: &Path) -> Result<(), LeaseStoreError> {
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), LeaseStoreError> {
        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| {
            LeaseStoreError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no such tmp file"))
        })?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn fsync_dir(&self, _path: &Path) -> Result<(), LeaseStoreError> {
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), LeaseStoreError> {
        self.files.lock().remove(path);
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, LeaseStoreError> {
        Ok(self.files.lock().get(path).cloned())
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, LeaseStoreError> {
        let files = self.files.lock();
        Ok(files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("task_") && n.ends_with(".json"))
            })
            .cloned()
            .collect())
    }

    fn create_dir_all(&self, _path: &Path) -> Result<(), LeaseStoreError> {
        Ok(())
    }
}

/// Whether a given pid is currently alive.
pub trait PidProbe: Send + Sync + 'static {
    fn is_alive(&self, pid: i32) -> bool;
}

/// Liveness probe backed by `/proc`, matching Linux's own model of what a
/// live process is without reaching for a signal-sending syscall.
#[derive(Clone, Default)]
pub struct OsPidProbe;

impl PidProbe for OsPidProbe {
    fn is_alive(&self, pid: i32) -> bool {
        pid > 0 && Path::new("/proc").join(pid.to_string()).exists()
    }
}

/// A stale lease paired with the reason it was flagged.
#[derive(Debug, Clone)]
pub struct StaleLease {
    pub lease: Lease,
    pub reason: String,
}

/// Manages lease files on disk, one JSON file per task under `lease_dir`.
pub struct LeaseStore<W: LeaseWriter = FsLeaseWriter, P: PidProbe = OsPidProbe> {
    writer: W,
    probe: P,
    lease_dir: PathBuf,
}

impl LeaseStore<FsLeaseWriter, OsPidProbe> {
    pub fn new(lease_dir: PathBuf) -> Result<Self, LeaseStoreError> {
        Self::with_writer(FsLeaseWriter, OsPidProbe, lease_dir)
    }
}

impl<W: LeaseWriter, P: PidProbe> LeaseStore<W, P> {
    pub fn with_writer(writer: W, probe: P, lease_dir: PathBuf) -> Result<Self, LeaseStoreError> {
        writer.create_dir_all(&lease_dir)?;
        Ok(Self { writer, probe, lease_dir })
    }

    fn lease_path(&self, task_id: &str) -> PathBuf {
        self.lease_dir.join(format!("task_{task_id}.json"))
    }

    fn tmp_path(&self, task_id: &str) -> PathBuf {
        self.lease_dir.join(format!("task_{task_id}.tmp"))
    }

    fn write_atomic(&self, lease: &Lease) -> Result<(), LeaseStoreError> {
        let path = self.lease_path(&lease.task_id);
        let tmp = self.tmp_path(&lease.task_id);
        let data = serde_json::to_vec_pretty(lease)?;
        self.writer.write_tmp(&tmp, &data)?;
        self.writer.fsync_file(&tmp)?;
        self.writer.rename(&tmp, &path)?;
        self.writer.fsync_dir(&self.lease_dir)?;
        Ok(())
    }

    pub fn create(&self, lease: &Lease) -> Result<(), LeaseStoreError> {
        let path = self.lease_path(&lease.task_id);
        if self.writer.read(&path)?.is_some() {
            return Err(LeaseStoreError::AlreadyExists(lease.task_id.clone()));
        }
        self.write_atomic(lease)
    }

    pub fn read(&self, task_id: &str) -> Option<Lease> {
        match self.writer.read(&self.lease_path(task_id)) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(lease) => Some(lease),
                Err(e) => {
                    tracing::warn!(task_id, error = %e, "failed to parse lease file, treating as absent");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(task_id, error = %e, "failed to read lease file, treating as absent");
                None
            }
        }
    }

    pub fn update(&self, lease: &Lease) -> Result<(), LeaseStoreError> {
        let path = self.lease_path(&lease.task_id);
        if self.writer.read(&path)?.is_none() {
            return Err(LeaseStoreError::NotFound(lease.task_id.clone()));
        }
        self.write_atomic(lease)
    }

    pub fn delete(&self, task_id: &str) -> bool {
        let path = self.lease_path(task_id);
        match self.writer.read(&path) {
            Ok(Some(_)) => match self.writer.remove(&path) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(task_id, error = %e, "failed to delete lease file");
                    false
                }
            },
            _ => false,
        }
    }

    pub fn list_all(&self) -> Vec<Lease> {
        let paths = match self.writer.list(&self.lease_dir) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list lease directory");
                return Vec::new();
            }
        };
        paths
            .iter()
            .filter_map(|path| task_id_from_path(path))
            .filter_map(|task_id| self.read(&task_id))
            .collect()
    }

    pub fn list_by_agent(&self, agent: &str) -> Vec<Lease> {
        self.list_all().into_iter().filter(|l| l.agent == agent).collect()
    }

    pub fn update_heartbeat(&self, task_id: &str) -> bool {
        let Some(mut lease) = self.read(task_id) else {
            return false;
        };
        lease.heartbeat = chrono::Utc::now();
        self.update(&lease).is_ok()
    }

    pub fn is_process_alive(&self, pid: i32) -> bool {
        self.probe.is_alive(pid)
    }

    /// Leases whose owning process is dead or whose time budget has expired.
    /// PID death is checked first and reported as the reason whenever both
    /// conditions hold, since a dead process is the unambiguous signal.
    pub fn find_stale_leases(&self, max_runtime_sec: i64, check_pid: bool) -> Vec<StaleLease> {
        let mut stale = Vec::new();
        for lease in self.list_all() {
            if check_pid && !self.probe.is_alive(lease.pid) {
                stale.push(StaleLease {
                    reason: format!("process {} is not alive", lease.pid),
                    lease,
                });
                continue;
            }
            if lease.is_stale(max_runtime_sec) {
                let reason = if lease.age_seconds() > max_runtime_sec {
                    format!(
                        "runtime exceeded {max_runtime_sec}s (actual: {}s)",
                        lease.age_seconds()
                    )
                } else {
                    format!("heartbeat stale (age: {}s)", lease.heartbeat_age_seconds())
                };
                stale.push(StaleLease { lease, reason });
            }
        }
        stale
    }

    /// Delete a lease identified as stale, logging why.
    pub fn reclaim_lease(&self, lease: &Lease, reason: &str) -> bool {
        tracing::info!(task_id = %lease.task_id, agent = %lease.agent, reason, "reclaiming stale lease");
        self.delete(&lease.task_id)
    }

    /// Active (`state == "running"`) lease count per agent.
    pub fn count_active_by_agent(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for lease in self.list_all() {
            if lease.state == "running" {
                *counts.entry(lease.agent).or_insert(0) += 1;
            }
        }
        counts
    }
}

fn task_id_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("task_"))
        .map(str::to_string)
}

#[cfg(test)]
#[path = "lease_store_tests.rs"]
mod tests;
