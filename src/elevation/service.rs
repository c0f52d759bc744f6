use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::activator::PrivilegeActivator;
use super::challenge::ChallengeStore;
use super::clock::{SharedClock, SystemClock};
use super::error::ElevationError;
use super::grant::GrantStore;
use super::lock::{ActivationLock, LockState};
use super::rollback::{RollbackOutcome, RollbackScheduler, SweepOutcome};
use super::toggle::{DryRunToggle, PrivilegeToggle, SudoersSettings, SudoersToggle};
use crate::config::{AppConfig, ToggleKind};
use crate::database::DatabaseManager;
use crate::notify::{self, NotificationChannel};

pub const DEFAULT_ACTION: &str = "visudo";

const VERIFY_FAILED: &str = "Invalid or expired code";
const INTERNAL_FAILURE: &str = "An error occurred while processing your request";

/// Coarse failure class, used by the HTTP layer to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Wrong, expired, replayed or foreign code
    Rejected,
    NotVerified,
    NotGranted,
    Conflict,
    InvalidConfiguration,
    Toggle,
    Internal,
}

impl From<&ElevationError> for FailureKind {
    fn from(err: &ElevationError) -> Self {
        match err {
            ElevationError::NotFound(_) | ElevationError::Expired(_) | ElevationError::AlreadyUsed(_) => {
                FailureKind::Rejected
            }
            ElevationError::NotVerified => FailureKind::NotVerified,
            ElevationError::LockActive { .. } => FailureKind::Conflict,
            ElevationError::SyntaxValidationFailed(_) => FailureKind::InvalidConfiguration,
            ElevationError::MissingTarget(_) | ElevationError::ToggleFailed(_) => FailureKind::Toggle,
            ElevationError::NotificationFailed(_) | ElevationError::Io(_) | ElevationError::Storage(_) => {
                FailureKind::Internal
            }
        }
    }
}

/// What every request-level operation hands back: a success flag, a message
/// for the operator and optional structured data
#[derive(Debug, Clone, Serialize)]
pub struct ElevationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl ElevationOutcome {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            failure: None,
        }
    }

    pub fn fail(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            failure: Some(kind),
        }
    }

    /// Actionable errors keep their text, internal ones are logged and masked
    fn from_error(context: &str, err: ElevationError) -> Self {
        let kind = FailureKind::from(&err);
        if err.is_internal() {
            error!("{} failed: {}", context, err);
            return Self::fail(kind, INTERNAL_FAILURE);
        }
        warn!("{} refused: {}", context, err);
        Self::fail(kind, err.to_string())
    }
}

/// The elevation flow as seen by request handlers and the CLI:
/// challenge-request, challenge-verify, activate-privilege and their
/// supporting status, revoke and deactivate operations.
#[derive(Clone)]
pub struct ElevationService {
    challenges: ChallengeStore,
    grants: GrantStore,
    activator: PrivilegeActivator,
    notifier: Arc<dyn NotificationChannel>,
    db: DatabaseManager,
    clock: SharedClock,
}

impl ElevationService {
    pub fn builder(config: &AppConfig) -> ElevationServiceBuilder {
        ElevationServiceBuilder {
            config: config.clone(),
            clock: None,
            toggle: None,
            notifier: None,
        }
    }

    pub fn challenges(&self) -> &ChallengeStore {
        &self.challenges
    }

    pub fn grants(&self) -> &GrantStore {
        &self.grants
    }

    pub fn activator(&self) -> &PrivilegeActivator {
        &self.activator
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    /// Issue a code for the session and push it out-of-band.
    /// A failed delivery is logged and does not fail the request.
    pub async fn request_challenge(&self, session_id: &str, action: &str) -> ElevationOutcome {
        let (challenges, session, requested) = (self.challenges.clone(), session_id.to_string(), action.to_string());
        let challenge = match blocking(move || challenges.create(&session, &requested)).await {
            Ok(challenge) => challenge,
            Err(e) => return ElevationOutcome::from_error("Challenge request", e),
        };

        let ttl_minutes = (challenge.expires_at - challenge.created_at) / 60;
        let message = format!(
            "*Verification code*\n\nCode: `{}`\nAction: {}\nValid for {} minutes",
            challenge.code, challenge.action, ttl_minutes
        );
        let delivered = self.notifier.send(&message).await;
        if !delivered {
            let err = ElevationError::NotificationFailed(format!("{} channel", self.notifier.name()));
            warn!(session = %session_id, "{}", err);
        }

        ElevationOutcome::ok(
            "Verification code sent",
            json!({
                "challenge_id": challenge.id,
                "action": challenge.action,
                "expires_at": challenge.expires_at,
                "delivered": delivered,
            }),
        )
    }

    pub async fn verify_challenge(&self, session_id: &str, code: &str) -> ElevationOutcome {
        let (challenges, session, code) = (self.challenges.clone(), session_id.to_string(), code.to_string());
        match blocking(move || challenges.verify(&code, &session)).await {
            Ok(true) => ElevationOutcome::ok("Identity verified", json!({ "verified": true })),
            Ok(false) => ElevationOutcome::fail(FailureKind::Rejected, VERIFY_FAILED),
            Err(e) => {
                error!("Challenge verification failed: {}", e);
                ElevationOutcome::fail(FailureKind::Internal, VERIFY_FAILED)
            }
        }
    }

    /// Open the privilege window for a session that has just verified a
    /// challenge, then record its grant
    pub async fn activate_privilege(&self, session_id: &str, user_id: &str) -> ElevationOutcome {
        let (challenges, session) = (self.challenges.clone(), session_id.to_string());
        match blocking(move || challenges.has_verified(&session, DEFAULT_ACTION)).await {
            Ok(true) => {}
            Ok(false) => return ElevationOutcome::from_error("Privilege activation", ElevationError::NotVerified),
            Err(e) => return ElevationOutcome::from_error("Privilege activation", e),
        }

        let activator = self.activator.clone();
        let activation = match blocking(move || activator.activate()).await {
            Ok(activation) => activation,
            Err(e) => return ElevationOutcome::from_error("Privilege activation", e),
        };

        let (grants, session, user) = (self.grants.clone(), session_id.to_string(), user_id.to_string());
        let grant = match blocking(move || grants.grant(&session, &user)).await {
            Ok(grant) => grant,
            Err(e) => return ElevationOutcome::from_error("Grant", e),
        };

        info!(target: "audit", session = %session_id, user = %user_id, "temporary privileges enabled");
        let minutes = (activation.expires_at - activation.activated_at) / 60;
        ElevationOutcome::ok(
            format!("Privileges enabled for {} minutes", minutes),
            json!({
                "activated_at": activation.activated_at,
                "expires_at": activation.expires_at,
                "grant_expires_at": grant.expires_at,
            }),
        )
    }

    pub async fn status(&self, session_id: &str) -> ElevationOutcome {
        let (grants, activator, session) = (self.grants.clone(), self.activator.clone(), session_id.to_string());
        let (grant, activation) = match blocking(move || Ok((grants.get(&session)?, activator.state()?))).await {
            Ok(found) => found,
            Err(e) => return ElevationOutcome::from_error("Status", e),
        };

        let now = self.clock.now();
        let grant = grant.map(|g| {
            json!({
                "user_id": g.user_id,
                "granted_at": g.granted_at,
                "renewed_at": g.renewed_at,
                "expires_at": g.expires_at,
                "remaining_secs": (g.expires_at - now).max(0),
            })
        });
        let message = match activation {
            LockState::Active { remaining_secs, .. } => format!("Privilege active ({}s remaining)", remaining_secs),
            LockState::Stale { .. } => "Privilege window elapsed, rollback pending".to_string(),
            LockState::Inactive => "Privilege inactive".to_string(),
        };

        ElevationOutcome::ok(message, json!({ "grant": grant, "activation": activation }))
    }

    pub async fn revoke_grant(&self, session_id: &str) -> ElevationOutcome {
        let (grants, session) = (self.grants.clone(), session_id.to_string());
        match blocking(move || grants.revoke(&session)).await {
            Ok(()) => ElevationOutcome::ok("Grant revoked", json!({ "revoked": true })),
            Err(e) => ElevationOutcome::from_error("Grant revoke", e),
        }
    }

    /// Gate for protected actions. Fails closed, including when the blocking
    /// task itself is lost.
    pub async fn has_grant(&self, session_id: &str) -> bool {
        let (grants, session) = (self.grants.clone(), session_id.to_string());
        blocking(move || Ok(grants.has_grant(&session))).await.unwrap_or(false)
    }

    /// Manual early revocation. Requires a live grant for the session.
    pub async fn deactivate(&self, session_id: &str) -> ElevationOutcome {
        if !self.has_grant(session_id).await {
            return ElevationOutcome::fail(FailureKind::NotGranted, "Identity verification required");
        }

        let activator = self.activator.clone();
        match blocking(move || activator.deactivate()).await {
            Ok(outcome) => {
                info!(target: "audit", session = %session_id, ?outcome, "manual deactivation");
                let message = match outcome {
                    RollbackOutcome::RolledBack => "Privileges disabled",
                    _ => "Privileges were not active",
                };
                ElevationOutcome::ok(message, json!({ "outcome": outcome }))
            }
            Err(e) => ElevationOutcome::from_error("Deactivation", e),
        }
    }

    /// One maintenance pass: overdue rollback plus expired-row purge
    pub fn sweep(&self) -> Result<SweepOutcome, ElevationError> {
        let outcome = self.activator.scheduler().sweep(self.activator.lock())?;
        let challenges = self.challenges.purge_expired()?;
        let grants = self.grants.purge_expired()?;
        if challenges + grants > 0 {
            info!("Sweep purged {} challenges, {} grants", challenges, grants);
        }
        Ok(outcome)
    }

    /// Startup recovery of an activation left behind by a previous process
    pub fn recover(&self) -> Result<SweepOutcome, ElevationError> {
        self.activator.scheduler().recover(self.activator.lock())
    }

    /// Periodic sweep so the deadline holds even when no timer survived
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let pass = service.clone();
                if let Err(e) = blocking(move || pass.sweep()).await {
                    error!("Rollback sweep failed: {}", e);
                }
            }
        })
    }
}

/// Run SQLite, filesystem and process work off the async worker threads
async fn blocking<T, F>(f: F) -> Result<T, ElevationError>
where
    F: FnOnce() -> Result<T, ElevationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ElevationError::Io(format!("blocking task failed: {}", e)))?
}

pub struct ElevationServiceBuilder {
    config: AppConfig,
    clock: Option<SharedClock>,
    toggle: Option<Arc<dyn PrivilegeToggle>>,
    notifier: Option<Arc<dyn NotificationChannel>>,
}

impl ElevationServiceBuilder {
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn toggle(mut self, toggle: Arc<dyn PrivilegeToggle>) -> Self {
        self.toggle = Some(toggle);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationChannel>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> anyhow::Result<ElevationService> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let toggle = match self.toggle {
            Some(toggle) => toggle,
            None => toggle_from_config(&config),
        };
        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => notify::from_config(&config.notify, &config.environment)?,
        };

        let db = DatabaseManager::open(
            &config.storage.database_path(),
            Duration::from_millis(config.storage.busy_timeout_ms),
        )?;
        let elevation = &config.elevation;
        let lock = ActivationLock::new(config.storage.lock_path());
        let scheduler = RollbackScheduler::new(toggle.clone(), clock.clone(), elevation.activation_secs);

        Ok(ElevationService {
            challenges: ChallengeStore::new(db.clone(), clock.clone(), elevation.challenge_ttl_secs),
            grants: GrantStore::new(db.clone(), clock.clone(), elevation.grant_ttl_secs),
            activator: PrivilegeActivator::new(lock, toggle, clock.clone(), scheduler),
            notifier,
            db,
            clock,
        })
    }
}

fn toggle_from_config(config: &AppConfig) -> Arc<dyn PrivilegeToggle> {
    match config.privilege.toggle {
        ToggleKind::Sudoers => Arc::new(SudoersToggle::new(SudoersSettings::from(&config.privilege))),
        ToggleKind::DryRun => {
            warn!("Using dry-run privilege toggle; sudoers will not be modified");
            Arc::new(DryRunToggle::new())
        }
    }
}
