use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;

use super::error::ElevationError;
use super::toggle::write_atomic;

/// What the lock file says about the privilege window at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    Inactive,
    Active { activated_at: i64, remaining_secs: i64 },
    /// Window elapsed but the lock was never cleaned up
    Stale { activated_at: i64 },
}

/// The activation lock file: its whole content is the unix timestamp of the
/// activation. A sibling `.mutex` file carries the advisory `flock` that
/// serializes every reader-then-writer of the lock across processes.
#[derive(Debug, Clone)]
pub struct ActivationLock {
    path: PathBuf,
    mutex_path: PathBuf,
}

/// Held for the duration of a check-then-mutate sequence. Unlocks on drop.
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl ActivationLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mutex_path = path.with_extension("mutex");
        Self { path, mutex_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until this process holds the exclusive activation mutex
    pub fn acquire(&self) -> Result<LockGuard, ElevationError> {
        if let Some(dir) = self.mutex_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.mutex_path)?;
        file.lock_exclusive()?;
        Ok(LockGuard { file })
    }

    /// Activation timestamp, `None` when no lock exists.
    /// Unreadable content counts as timestamp 0, i.e. long stale.
    pub fn read(&self) -> Result<Option<i64>, ElevationError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content.trim().parse().unwrap_or(0))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, activated_at: i64) -> Result<(), ElevationError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        write_atomic(&self.path, &activated_at.to_string())?;
        Ok(())
    }

    /// Returns whether a lock file was actually removed
    pub fn remove(&self) -> Result<bool, ElevationError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn state(&self, now: i64, duration_secs: i64) -> Result<LockState, ElevationError> {
        Ok(match self.read()? {
            None => LockState::Inactive,
            Some(activated_at) => classify(activated_at, now, duration_secs),
        })
    }
}

/// A timestamp ahead of the clock (the clock stepped back) cannot belong to a
/// live window on this host and counts as stale, so sweeps still revert it.
fn classify(activated_at: i64, now: i64, duration_secs: i64) -> LockState {
    let age = now - activated_at;
    if activated_at > 0 && (0..duration_secs).contains(&age) {
        LockState::Active {
            activated_at,
            remaining_secs: duration_secs - age,
        }
    } else {
        LockState::Stale { activated_at }
    }
}
