//! SQLite persistence shared by every cell.

mod schema;
mod state;
pub mod time;

pub use schema::SCHEMA;
pub use state::AppState;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed timestamp: {0}")]
    Timestamp(String),

    #[error("Malformed column value: {0}")]
    Malformed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Connection lock poisoned")]
    Poisoned,

    #[error("Blocking database task failed: {0}")]
    TaskFailed(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Parse a UUID stored as TEXT.
pub fn parse_uuid(raw: &str) -> DbResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| DbError::Malformed(format!("id {:?}: {}", raw, e)))
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => AppError::NotFound(msg),
            DbError::Constraint(msg) => AppError::Conflict(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// Shared handle to the clinic database.
///
/// A single connection sits behind a mutex; every [`Database::write`] runs in a
/// `BEGIN IMMEDIATE` transaction, so a check-then-write sequence inside one
/// closure is serialized against every other writer.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> DbResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!("Opened database at {}", path.as_ref().display());
        Self::initialize(conn)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    pub fn from_config(config: &AppConfig) -> DbResult<Self> {
        if config.is_in_memory_database() {
            warn!("Using in-memory database; data will not survive a restart");
            Self::open_in_memory()
        } else {
            Self::open(
                &config.database_path,
                Duration::from_millis(config.busy_timeout_ms),
            )
        }
    }

    fn initialize(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        debug!("Database schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read-only closure on a blocking thread.
    pub async fn read<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| E::from(DbError::Poisoned))?;
            f(&guard)
        })
        .await
        .map_err(|e| E::from(DbError::TaskFailed(e.to_string())))?
    }

    /// Run a closure inside an immediate transaction.
    ///
    /// Commits when the closure returns `Ok`; any `Err` rolls the whole unit back.
    pub async fn write<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| E::from(DbError::Poisoned))?;
            let tx = guard
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| E::from(DbError::from(e)))?;
            let value = f(&tx)?;
            tx.commit().map_err(|e| E::from(DbError::from(e)))?;
            Ok(value)
        })
        .await
        .map_err(|e| E::from(DbError::TaskFailed(e.to_string())))?
    }
}

/// Run `f` inside a named savepoint of the enclosing transaction.
///
/// On error only the savepoint's work is undone; the outer transaction keeps
/// whatever it did before.
pub fn with_savepoint<T, E, F>(conn: &Connection, name: &str, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<DbError>,
{
    conn.execute_batch(&format!("SAVEPOINT {}", name))
        .map_err(DbError::from)?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE SAVEPOINT {}", name))
                .map_err(DbError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}",
                name = name
            )) {
                warn!("Failed to roll back savepoint {}: {}", name, rollback_err);
            }
            Err(err)
        }
    }
}
