use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::schema::ELEVATION_SCHEMA;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Cannot create data directory {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Shared handle to one SQLite connection.
///
/// Every process opens its own connection to the same file; SQLite's file
/// locking is what serializes writers across processes. Inside a process the
/// mutex serializes callers sharing this handle.
#[derive(Clone)]
pub struct DatabaseManager {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl DatabaseManager {
    /// Open (creating if needed) the database file and apply the schema
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| DatabaseError::DataDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::init_connection(&conn)?;

        info!("Opened elevation database: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory database (for testing)
    pub fn memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), DatabaseError> {
        // WAL lets readers proceed while one writer holds the lock (no-op in memory)
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(ELEVATION_SCHEMA)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the connection for one unit of work
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    /// Pings the database to ensure it is readable
    pub fn health_check(&self) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

impl From<DatabaseError> for crate::elevation::ElevationError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Sqlite(e) => crate::elevation::ElevationError::Storage(e),
            other => crate::elevation::ElevationError::Io(other.to_string()),
        }
    }
}
