use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::clock::SharedClock;
use super::error::ElevationError;
use crate::database::DatabaseManager;

/// Record that a session currently holds elevated privilege
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub session_id: String,
    pub user_id: String,
    pub expires_at: i64,
    pub granted_at: i64,
    pub renewed_at: Option<i64>,
}

impl Grant {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get("session")?,
            user_id: row.get("usuario_id")?,
            expires_at: row.get("expires")?,
            granted_at: row.get("granted_at")?,
            renewed_at: row.get("renewed_at")?,
        })
    }
}

/// Session-scoped grant bookkeeping. `session` is the primary key, so a
/// second grant for the same session can only ever renew the first.
#[derive(Clone)]
pub struct GrantStore {
    db: DatabaseManager,
    clock: SharedClock,
    ttl_secs: i64,
}

impl GrantStore {
    pub fn new(db: DatabaseManager, clock: SharedClock, ttl_secs: i64) -> Self {
        Self { db, clock, ttl_secs }
    }

    /// Create or renew the grant for `session_id`
    pub fn grant(&self, session_id: &str, user_id: &str) -> Result<Grant, ElevationError> {
        let now = self.clock.now();
        let expires_at = now + self.ttl_secs;

        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM grants WHERE expires < ?1", params![now])?;
        let renewed = tx.execute(
            "UPDATE grants SET expires = ?1, renewed_at = ?2 WHERE session = ?3",
            params![expires_at, now, session_id],
        )?;
        if renewed == 0 {
            tx.execute(
                r#"
                INSERT INTO grants (session, usuario_id, expires, granted_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![session_id, user_id, expires_at, now],
            )?;
        }
        let grant = tx.query_row(
            "SELECT * FROM grants WHERE session = ?1",
            params![session_id],
            Grant::from_row,
        )?;
        tx.commit()?;

        info!(
            target: "audit",
            session = %session_id,
            user = %user_id,
            renewed = renewed > 0,
            "privilege grant recorded"
        );
        Ok(grant)
    }

    /// Gate for protected operations. Fails closed on storage errors.
    pub fn has_grant(&self, session_id: &str) -> bool {
        match self.get(session_id) {
            Ok(grant) => grant.is_some(),
            Err(e) => {
                error!("Grant lookup failed for session {}: {}", session_id, e);
                false
            }
        }
    }

    /// Active (unexpired) grant for the session, if any
    pub fn get(&self, session_id: &str) -> Result<Option<Grant>, ElevationError> {
        let now = self.clock.now();
        let conn = self.db.lock()?;
        let grant = conn
            .query_row(
                "SELECT * FROM grants WHERE session = ?1 AND expires >= ?2",
                params![session_id, now],
                Grant::from_row,
            )
            .optional()?;
        Ok(grant)
    }

    /// Remove any grant for the session. Safe when none exists.
    pub fn revoke(&self, session_id: &str) -> Result<(), ElevationError> {
        let conn = self.db.lock()?;
        let removed = conn.execute("DELETE FROM grants WHERE session = ?1", params![session_id])?;
        if removed > 0 {
            info!(target: "audit", session = %session_id, "privilege grant revoked");
        }
        Ok(())
    }

    /// Seconds left on the session's grant, `None` if there is no live grant
    pub fn time_remaining(&self, session_id: &str) -> Result<Option<i64>, ElevationError> {
        let now = self.clock.now();
        Ok(self
            .get(session_id)?
            .map(|grant| grant.expires_at - now)
            .filter(|remaining| *remaining > 0))
    }

    pub fn purge_expired(&self) -> Result<usize, ElevationError> {
        let now = self.clock.now();
        let conn = self.db.lock()?;
        let purged = conn.execute("DELETE FROM grants WHERE expires < ?1", params![now])?;
        if purged > 0 {
            debug!("Purged {} expired grants", purged);
        }
        Ok(purged)
    }

    #[cfg(test)]
    fn count(&self, session_id: &str) -> i64 {
        let conn = self.db.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM grants WHERE session = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::clock::ManualClock;
    use std::sync::Arc;

    const T0: i64 = 1_700_000_000;

    fn store() -> (GrantStore, ManualClock) {
        let clock = ManualClock::new(T0);
        let db = DatabaseManager::memory().unwrap();
        (GrantStore::new(db, Arc::new(clock.clone()), 1800), clock)
    }

    #[test]
    fn repeated_grant_renews_single_record() {
        let (store, clock) = store();
        let first = store.grant("sess-1", "user-7").unwrap();
        clock.advance(10);
        let second = store.grant("sess-1", "user-7").unwrap();

        assert_eq!(store.count("sess-1"), 1);
        assert_eq!(first.expires_at, T0 + 1800);
        assert_eq!(second.expires_at, T0 + 10 + 1800);
        assert_eq!(second.granted_at, T0);
        assert_eq!(second.renewed_at, Some(T0 + 10));
    }

    #[test]
    fn has_grant_follows_ttl() {
        let (store, clock) = store();
        assert!(!store.has_grant("sess-1"));

        store.grant("sess-1", "user-7").unwrap();
        assert!(store.has_grant("sess-1"));
        assert!(!store.has_grant("sess-2"));

        clock.advance(1800);
        assert!(store.has_grant("sess-1"));
        clock.advance(1);
        assert!(!store.has_grant("sess-1"));
    }

    #[test]
    fn revoke_removes_grant_and_is_idempotent() {
        let (store, _) = store();
        store.grant("sess-1", "user-7").unwrap();

        store.revoke("sess-1").unwrap();
        assert!(!store.has_grant("sess-1"));
        store.revoke("sess-1").unwrap();
        store.revoke("never-granted").unwrap();
    }

    #[test]
    fn time_remaining_reports_seconds_left() {
        let (store, clock) = store();
        assert_eq!(store.time_remaining("sess-1").unwrap(), None);

        store.grant("sess-1", "user-7").unwrap();
        clock.advance(600);
        assert_eq!(store.time_remaining("sess-1").unwrap(), Some(1200));

        clock.advance(1200);
        assert_eq!(store.time_remaining("sess-1").unwrap(), None);
    }

    #[test]
    fn expired_grant_is_replaced_not_renewed() {
        let (store, clock) = store();
        store.grant("sess-1", "user-7").unwrap();
        clock.advance(1801);

        let fresh = store.grant("sess-1", "user-7").unwrap();
        assert_eq!(fresh.granted_at, T0 + 1801);
        assert_eq!(fresh.renewed_at, None);
        assert_eq!(store.count("sess-1"), 1);
    }

    #[test]
    fn purge_drops_only_expired() {
        let (store, clock) = store();
        store.grant("old", "user-1").unwrap();
        clock.advance(1000);
        store.grant("new", "user-2").unwrap();
        clock.advance(900);

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(!store.has_grant("old"));
        assert!(store.has_grant("new"));
    }
}
