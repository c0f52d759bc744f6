use rand::Rng;
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use super::clock::SharedClock;
use super::error::ElevationError;
use crate::database::DatabaseManager;

pub const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// One-time code bound to a session and an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub code: String,
    pub session_id: String,
    pub action: String,
    pub expires_at: i64,
    pub used: bool,
    pub created_at: i64,
    pub verified_at: Option<i64>,
}

impl Challenge {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            code: row.get("code")?,
            session_id: row.get("session")?,
            action: row.get("action")?,
            expires_at: row.get("expires")?,
            used: row.get::<_, i64>("used")? != 0,
            created_at: row.get("created_at")?,
            verified_at: row.get("verified_at")?,
        })
    }
}

/// Issues and verifies one-time codes.
///
/// Every read-check-write runs inside a `BEGIN IMMEDIATE` transaction, so two
/// processes racing on the same code serialize on the SQLite write lock and
/// only one of them can ever observe `used = 0`.
#[derive(Clone)]
pub struct ChallengeStore {
    db: DatabaseManager,
    clock: SharedClock,
    ttl_secs: i64,
}

impl ChallengeStore {
    pub fn new(db: DatabaseManager, clock: SharedClock, ttl_secs: i64) -> Self {
        Self { db, clock, ttl_secs }
    }

    /// Issue a fresh code for `session_id`, purging expired challenges first
    pub fn create(&self, session_id: &str, action: &str) -> Result<Challenge, ElevationError> {
        let now = self.clock.now();
        let challenge = Challenge {
            id: Uuid::new_v4().simple().to_string(),
            code: generate_code(),
            session_id: session_id.to_string(),
            action: action.to_string(),
            expires_at: now + self.ttl_secs,
            used: false,
            created_at: now,
            verified_at: None,
        };

        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let purged = tx.execute("DELETE FROM challenges WHERE expires < ?1", params![now])?;
        tx.execute(
            r#"
            INSERT INTO challenges (id, code, session, action, expires, used, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
            params![
                challenge.id,
                challenge.code,
                challenge.session_id,
                challenge.action,
                challenge.expires_at,
                challenge.created_at,
            ],
        )?;
        tx.commit()?;

        if purged > 0 {
            debug!("Purged {} expired challenges", purged);
        }
        info!(target: "audit", session = %session_id, action = %action, "challenge issued");
        Ok(challenge)
    }

    /// Consume a matching, unused, unexpired challenge.
    ///
    /// Returns `Ok(false)` for every kind of mismatch. The reason is logged at
    /// debug level only.
    pub fn verify(&self, code: &str, session_id: &str) -> Result<bool, ElevationError> {
        let code = normalize_code(code);
        if !is_well_formed(&code) {
            debug!(session = %session_id, "challenge rejected: malformed code");
            return Ok(false);
        }

        let now = self.clock.now();
        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidate: Option<String> = tx
            .query_row(
                r#"
                SELECT id FROM challenges
                WHERE code = ?1 AND session = ?2 AND used = 0 AND expires >= ?3
                ORDER BY created_at DESC
                LIMIT 1
                "#,
                params![code, session_id, now],
                |row| row.get(0),
            )
            .optional()?;

        let Some(id) = candidate else {
            let reason = Self::rejection_reason(&tx, &code, session_id, now)?;
            debug!(session = %session_id, "challenge rejected: {}", reason);
            info!(
                target: "audit",
                session = %session_id,
                fingerprint = %fingerprint(&code),
                "challenge verification failed"
            );
            return Ok(false);
        };

        tx.execute(
            "UPDATE challenges SET used = 1, verified_at = ?1 WHERE id = ?2 AND used = 0",
            params![now, id],
        )?;
        tx.commit()?;

        info!(target: "audit", session = %session_id, "challenge verified");
        Ok(true)
    }

    /// True when the session holds a consumed challenge for `action` that has not expired yet
    pub fn has_verified(&self, session_id: &str, action: &str) -> Result<bool, ElevationError> {
        let now = self.clock.now();
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM challenges
            WHERE session = ?1 AND action = ?2 AND used = 1 AND expires >= ?3
            "#,
            params![session_id, action, now],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<Challenge>, ElevationError> {
        let conn = self.db.lock()?;
        let challenge = conn
            .query_row("SELECT * FROM challenges WHERE id = ?1", params![id], Challenge::from_row)
            .optional()?;
        Ok(challenge)
    }

    /// Delete every challenge whose expiry has passed
    pub fn purge_expired(&self) -> Result<usize, ElevationError> {
        let now = self.clock.now();
        let conn = self.db.lock()?;
        let purged = conn.execute("DELETE FROM challenges WHERE expires < ?1", params![now])?;
        Ok(purged)
    }

    fn rejection_reason(
        tx: &Transaction<'_>,
        code: &str,
        session_id: &str,
        now: i64,
    ) -> Result<ElevationError, ElevationError> {
        let latest = tx
            .query_row(
                r#"
                SELECT * FROM challenges
                WHERE code = ?1 AND session = ?2
                ORDER BY created_at DESC
                LIMIT 1
                "#,
                params![code, session_id],
                Challenge::from_row,
            )
            .optional()?;

        Ok(match latest {
            None => ElevationError::NotFound("no challenge for code and session".to_string()),
            Some(c) if c.used => ElevationError::AlreadyUsed(c.id),
            Some(c) if c.expires_at < now => ElevationError::Expired(c.id),
            Some(c) => ElevationError::NotFound(c.id),
        })
    }
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Short digest of an attempted code, safe to write to the audit log
fn fingerprint(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    format!("{:x}", digest)[..12].to_string()
}
