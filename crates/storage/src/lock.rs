// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-process exclusion, preventing two reconciliation passes from
//! running concurrently against the same lease directory.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another process already holds the lock at {0}")]
    AlreadyLocked(PathBuf),
}

/// An acquired exclusive lock on a file, held for the lifetime of the value.
///
/// Released on drop. The file is opened without truncation before the lock
/// is confirmed, so a failed acquisition never clobbers the PID already
/// written there by the process that holds the lock.
pub struct ExclusionLock {
    file: File,
    path: PathBuf,
}

impl ExclusionLock {
    /// Attempt to acquire the lock at `path`, creating the file if needed.
    /// Fails immediately (non-blocking) if another process already holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().write(true).create(true).truncate(false).open(&path)?;

        file.try_lock_exclusive().map_err(|_| LockError::AlreadyLocked(path.clone()))?;

        let mut file = file;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExclusionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
