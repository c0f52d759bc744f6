pub mod activator;
pub mod challenge;
pub mod clock;
pub mod error;
pub mod grant;
pub mod lock;
pub mod rollback;
pub mod service;
pub mod toggle;

pub use activator::{Activation, PrivilegeActivator};
pub use challenge::{Challenge, ChallengeStore};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::ElevationError;
pub use grant::{Grant, GrantStore};
pub use lock::{ActivationLock, LockState};
pub use rollback::{RollbackOutcome, RollbackScheduler, SweepOutcome};
pub use service::{ElevationOutcome, ElevationService, FailureKind, DEFAULT_ACTION};
pub use toggle::{DryRunToggle, PrivilegeToggle, SudoersSettings, SudoersToggle, ToggleSnapshot};

/*
 * Temporary privilege elevation
 *
 *   request ──► ChallengeStore::create ──► NotificationChannel::send
 *   code    ──► ChallengeStore::verify   (single use, session bound)
 *   activate──► PrivilegeActivator::activate
 *                 flock(privilege.mutex)
 *                 lock file = now
 *                 toggle.enable + toggle.validate   (revert on failure)
 *                 RollbackScheduler::schedule
 *           ──► GrantStore::grant
 *
 * Revocation has one routine (RollbackScheduler::rollback) reached from the
 * in-process timer, the periodic sweep, startup recovery, the `enginex sweep`
 * command and manual deactivation. The lock file timestamp is the deadline,
 * so any process can decide whether a window is over.
 *
 * Challenges and grants share one SQLite file; every check-then-write runs in
 * a BEGIN IMMEDIATE transaction.
 */
