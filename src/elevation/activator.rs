use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use super::clock::SharedClock;
use super::error::ElevationError;
use super::lock::{ActivationLock, LockState};
use super::rollback::{RollbackOutcome, RollbackScheduler};
use super::toggle::{PrivilegeToggle, ToggleSnapshot};

/// A successfully opened privilege window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub activated_at: i64,
    pub expires_at: i64,
}

/// Flips the system privilege on for one fixed window.
///
/// Activation is a two-state toggle guarded by the lock file, not a counter:
/// while a window is open every further `activate` fails with `LockActive`.
#[derive(Clone)]
pub struct PrivilegeActivator {
    lock: ActivationLock,
    toggle: Arc<dyn PrivilegeToggle>,
    clock: SharedClock,
    scheduler: RollbackScheduler,
}

impl PrivilegeActivator {
    pub fn new(
        lock: ActivationLock,
        toggle: Arc<dyn PrivilegeToggle>,
        clock: SharedClock,
        scheduler: RollbackScheduler,
    ) -> Self {
        Self {
            lock,
            toggle,
            clock,
            scheduler,
        }
    }

    pub fn lock(&self) -> &ActivationLock {
        &self.lock
    }

    pub fn scheduler(&self) -> &RollbackScheduler {
        &self.scheduler
    }

    fn duration_secs(&self) -> i64 {
        self.scheduler.duration_secs()
    }

    pub fn state(&self) -> Result<LockState, ElevationError> {
        self.lock.state(self.clock.now(), self.duration_secs())
    }

    pub fn activate(&self) -> Result<Activation, ElevationError> {
        let guard = self.lock.acquire()?;
        let now = self.clock.now();
        let duration = self.duration_secs();

        match self.lock.state(now, duration)? {
            LockState::Active { remaining_secs, .. } => {
                warn!("Privilege activation refused: window open ({}s remaining)", remaining_secs);
                return Err(ElevationError::LockActive { remaining_secs });
            }
            LockState::Stale { activated_at } => {
                // Rollback never fired for this one; put the block back before reusing it
                warn!("Discarding stale activation lock from {}", activated_at);
                self.toggle.disable()?;
                self.lock.remove()?;
            }
            LockState::Inactive => {}
        }

        if !self.toggle.target_exists() {
            return Err(ElevationError::MissingTarget(self.toggle.target()));
        }

        let previous = self.toggle.snapshot()?;
        self.lock.write(now)?;
        info!("Activating temporary privileges ({})", self.toggle.describe());

        if let Err(e) = self.toggle.enable().and_then(|_| self.toggle.validate()) {
            error!("Privilege activation failed, reverting: {}", e);
            self.abort(&previous);
            return Err(e);
        }
        drop(guard);

        self.scheduler.schedule(&self.lock, Duration::from_secs(duration as u64));

        info!(target: "audit", activated_at = now, duration_secs = duration, "privilege activated");
        Ok(Activation {
            activated_at: now,
            expires_at: now + duration,
        })
    }

    /// Manual early revocation; same revert-and-unlock path as the timer
    pub fn deactivate(&self) -> Result<RollbackOutcome, ElevationError> {
        self.scheduler.rollback(&self.lock, None)
    }

    /// Undo a half-finished activation by writing back the exact prior
    /// configuration. Must run while the mutex is held.
    fn abort(&self, previous: &ToggleSnapshot) {
        match self.toggle.restore(previous) {
            Ok(()) => {
                if let Err(e) = self.lock.remove() {
                    error!("Cannot remove activation lock after failed activation: {}", e);
                }
            }
            // Keep the lock so the sweeper retries the revert
            Err(e) => error!("Revert after failed activation also failed: {}", e),
        }
    }
}
