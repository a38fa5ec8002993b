//! SQLite-backed cursor store.

use crate::backend::{CursorStore, StoreStats};
use crate::config::{Location, StoreConfig};
use crate::error::{StoreError, StoreResult};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use tracing::{debug, trace};

type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cursors (
        label           TEXT NOT NULL,
        collection_id   TEXT NOT NULL,
        state           TEXT NOT NULL,      -- hex-encoded opaque feed state
        PRIMARY KEY (label, collection_id)
    );

    CREATE TABLE IF NOT EXISTS aliases (
        internal_key    TEXT NOT NULL,      -- hex-encoded content key
        collection_id   TEXT NOT NULL,
        object_id       TEXT NOT NULL,
        PRIMARY KEY (internal_key, collection_id)
    );
";

/// A cursor store persisted in an embedded SQLite database.
///
/// Connections come from an r2d2 pool so concurrent sync exchanges do not
/// serialize on a single handle. An in-memory database uses a pool of
/// exactly one connection that is never recycled, since every SQLite
/// connection to `:memory:` sees its own private database.
///
/// # Example
///
/// ```rust
/// use davsync_store::{CursorStore, SqliteCursorStore};
///
/// let store = SqliteCursorStore::open_in_memory().unwrap();
/// store.remember_alias("alice:AABB", "0a0b", "ev-1").unwrap();
/// assert_eq!(store.get_alias("alice:AABB", "0a0b").unwrap().as_deref(), Some("ev-1"));
/// ```
#[derive(Clone)]
pub struct SqliteCursorStore {
    pool: DbPool,
}

impl SqliteCursorStore {
    /// Opens (and if needed creates) the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid, the database
    /// cannot be opened, or the schema cannot be created.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let pool = match config.location()? {
            Location::Memory => Pool::builder()
                .max_size(1)
                .max_lifetime(None)
                .idle_timeout(None)
                .build(SqliteConnectionManager::memory())?,
            Location::File(path) => {
                debug!("Using sync db {}", path.display());
                let manager = SqliteConnectionManager::file(path).with_init(|conn| {
                    conn.execute_batch(
                        "PRAGMA journal_mode = WAL;
                         PRAGMA synchronous = NORMAL;
                         PRAGMA busy_timeout = 5000;",
                    )
                });
                Pool::builder()
                    .max_size(config.pool_size.max(1))
                    .build(manager)?
            }
        };

        let store = Self { pool };
        store.conn()?.execute_batch(SCHEMA)?;
        Ok(store)
    }

    /// Opens the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(&StoreConfig::new(path.as_ref().display().to_string()))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

impl CursorStore for SqliteCursorStore {
    fn get_cursor(&self, collection: &str, label: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM cursors WHERE collection_id = ?1 AND label = ?2",
                params![collection, label],
                |row| row.get(0),
            )
            .optional()?;

        state
            .map(|hex_state| {
                hex::decode(&hex_state).map_err(|e| {
                    StoreError::Corrupted(format!(
                        "cursor '{label}' of '{collection}' is not valid hex: {e}"
                    ))
                })
            })
            .transpose()
    }

    fn put_cursor(&self, collection: &str, label: &str, state: &[u8]) -> StoreResult<()> {
        trace!("put cursor '{}' for {} ({} bytes)", label, collection, state.len());
        self.conn()?.execute(
            "INSERT INTO cursors (label, collection_id, state) VALUES (?1, ?2, ?3)
             ON CONFLICT(label, collection_id) DO UPDATE SET state = excluded.state",
            params![label, collection, hex::encode(state)],
        )?;
        Ok(())
    }

    fn remember_alias(
        &self,
        collection: &str,
        internal_key: &str,
        object_id: &str,
    ) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO aliases (internal_key, collection_id, object_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(internal_key, collection_id) DO UPDATE SET object_id = excluded.object_id",
            params![internal_key, collection, object_id],
        )?;
        Ok(())
    }

    fn get_alias(&self, collection: &str, internal_key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        let alias = conn
            .query_row(
                "SELECT object_id FROM aliases WHERE collection_id = ?1 AND internal_key = ?2",
                params![collection, internal_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(alias)
    }

    fn labels(&self, collection: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT label FROM cursors WHERE collection_id = ?1 ORDER BY label")?;
        let labels = stmt
            .query_map(params![collection], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(labels)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.conn()?;
        let cursors: i64 = conn.query_row("SELECT COUNT(*) FROM cursors", [], |row| row.get(0))?;
        let aliases: i64 = conn.query_row("SELECT COUNT(*) FROM aliases", [], |row| row.get(0))?;
        Ok(StoreStats {
            cursors: cursors.max(0) as u64,
            aliases: aliases.max(0) as u64,
        })
    }
}
