//! SQLite-backed local storage.
//!
//! Values are written as plain text into a single key/value table. This is
//! the durable fallback for hosts without an OS keystore and carries the same
//! risk as browser local storage: anyone who can read the file can read the
//! ciphertext and attack the password offline.

use super::{SecureStorage, SecurityTier, StorageError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStorage {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::Poisoned)?;
            op(&conn).map_err(StorageError::from)
        })
        .await?
    }
}

#[async_trait]
impl SecureStorage for LocalStorage {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO items (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = key.to_string();
        self.run(move |conn| {
            conn.prepare_cached("SELECT value FROM items WHERE key = ?1")?
                .query_row(params![key], |row| row.get(0))
                .optional()
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.run(move |conn| {
            conn.execute("DELETE FROM items WHERE key = ?1", params![key])
                .map(|_| ())
        })
        .await
    }

    fn security_tier(&self) -> SecurityTier {
        SecurityTier::Untrusted
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
