use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::clock::SharedClock;
use super::error::ElevationError;
use super::lock::{ActivationLock, LockState};
use super::toggle::PrivilegeToggle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackOutcome {
    /// Privilege disabled and lock removed
    RolledBack,
    /// No lock present; somebody already rolled back
    NothingToDo,
    /// The lock now belongs to a later activation
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SweepOutcome {
    Idle,
    Pending { remaining_secs: i64 },
    RolledBack { activated_at: i64 },
}

/// Reverts the privilege toggle once the activation window has elapsed.
///
/// Two mechanisms cover the same deadline. `schedule` arms an in-process
/// timer; `sweep` compares the persisted lock timestamp against the clock and
/// can run from any process (startup recovery, the periodic sweeper task, the
/// `enginex sweep` command). Both end in `rollback`, which is also the path
/// used for manual early deactivation.
#[derive(Clone)]
pub struct RollbackScheduler {
    toggle: Arc<dyn PrivilegeToggle>,
    clock: SharedClock,
    duration_secs: i64,
}

impl RollbackScheduler {
    pub fn new(toggle: Arc<dyn PrivilegeToggle>, clock: SharedClock, duration_secs: i64) -> Self {
        Self {
            toggle,
            clock,
            duration_secs,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        self.duration_secs
    }

    /// Arm a detached timer that rolls back `lock` after `duration`.
    ///
    /// The timer only fires the rollback if the lock still carries the
    /// timestamp it had when scheduled. Without a tokio runtime nothing is
    /// armed and the persisted deadline is left to `sweep`.
    pub fn schedule(&self, lock: &ActivationLock, duration: Duration) -> Option<JoinHandle<()>> {
        let token = match lock.read() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No activation lock to schedule rollback for");
                return None;
            }
            Err(e) => {
                error!("Cannot read activation lock {}: {}", lock.path().display(), e);
                return None;
            }
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; rollback of {} left to the sweeper", lock.path().display());
            return None;
        };

        let scheduler = self.clone();
        let lock = lock.clone();
        info!("Rollback scheduled in {} seconds", duration.as_secs());

        Some(handle.spawn(async move {
            tokio::time::sleep(duration).await;
            match scheduler.rollback(&lock, Some(token)) {
                Ok(outcome) => debug!("Scheduled rollback finished: {:?}", outcome),
                Err(e) => error!("Scheduled rollback failed, sweeper will retry: {}", e),
            }
        }))
    }

    /// Disable the privilege and delete the lock, under the activation mutex.
    ///
    /// With `expected = Some(ts)` the rollback is skipped unless the lock still
    /// holds `ts`. The lock is only removed once the disable succeeded, so a
    /// failed revert leaves a lock behind for the next sweep.
    pub fn rollback(&self, lock: &ActivationLock, expected: Option<i64>) -> Result<RollbackOutcome, ElevationError> {
        let _guard = lock.acquire()?;

        let Some(current) = lock.read()? else {
            return Ok(RollbackOutcome::NothingToDo);
        };
        if expected.is_some_and(|token| token != current) {
            debug!("Activation lock superseded ({} -> {}), skipping rollback", expected.unwrap_or_default(), current);
            return Ok(RollbackOutcome::Superseded);
        }

        self.toggle.disable()?;
        lock.remove()?;

        info!(target: "audit", activated_at = current, "privilege auto-disabled");
        Ok(RollbackOutcome::RolledBack)
    }

    /// Roll back if the persisted deadline has passed
    pub fn sweep(&self, lock: &ActivationLock) -> Result<SweepOutcome, ElevationError> {
        match lock.state(self.clock.now(), self.duration_secs)? {
            LockState::Inactive => Ok(SweepOutcome::Idle),
            LockState::Active { remaining_secs, .. } => Ok(SweepOutcome::Pending { remaining_secs }),
            LockState::Stale { activated_at } => match self.rollback(lock, Some(activated_at))? {
                RollbackOutcome::RolledBack => Ok(SweepOutcome::RolledBack { activated_at }),
                // Raced with another rollback or a new activation; re-evaluate next time
                _ => Ok(SweepOutcome::Idle),
            },
        }
    }

    /// Startup recovery: roll back an overdue lock, re-arm a live one
    pub fn recover(&self, lock: &ActivationLock) -> Result<SweepOutcome, ElevationError> {
        let outcome = self.sweep(lock)?;
        match outcome {
            SweepOutcome::Pending { remaining_secs } => {
                info!("Re-arming rollback for live activation ({}s left)", remaining_secs);
                self.schedule(lock, Duration::from_secs(remaining_secs.max(0) as u64));
            }
            SweepOutcome::RolledBack { activated_at } => {
                warn!("Recovered overdue activation from {}", activated_at);
            }
            SweepOutcome::Idle => {}
        }
        Ok(outcome)
    }
}
