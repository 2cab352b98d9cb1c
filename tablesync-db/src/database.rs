use crate::error::{DbError, DbResult};
use crate::store::RowStore;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Shared handle to a SQLite database.
///
/// Cloning is cheap; clones share the same connection. All access is
/// serialized through one lock, and a transaction holds it for its whole
/// duration.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) a database file.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        debug!("Opened database {}", path.display());
        Self::init(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Locks the connection. A panic while the lock was held has already
    /// rolled back any open transaction, so a poisoned lock is recovered.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("Recovering database connection after a panic");
            self.conn.clear_poison();
            poisoned.into_inner()
        })
    }

    /// Runs raw SQL, e.g. to create tables.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.lock().execute_batch(sql)?;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> DbResult<bool> {
        let conn = self.lock();
        RowStore::new(&conn).table_exists(table)
    }

    /// Runs `f` against the connection without a transaction.
    pub fn with_store<T, E>(&self, f: impl FnOnce(&RowStore<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let conn = self.lock();
        f(&RowStore::new(&conn))
    }

    /// Runs `f` inside a transaction. Commits when `f` returns `Ok`; any
    /// error rolls back every write `f` made.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&RowStore<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(DbError::from)?;
        let result = f(&RowStore::new(&tx));
        match result {
            Ok(value) => {
                tx.commit().map_err(DbError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback_err);
                } else {
                    debug!("Rolled back transaction");
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
