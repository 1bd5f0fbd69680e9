//! SQLite-backed counter store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::CounterStore;
use crate::ticket::QueueError;

/// Counters kept in their own table so they survive ticket purges.
pub struct SqliteCounterStore {
    conn: Mutex<Connection>,
}

impl SqliteCounterStore {
    /// Open (or create) the counter table in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(store_err)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory counter store (useful for testing).
    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, QueueError> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(store_err)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS counters (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            "#,
        )
        .map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::StoreUnavailable("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn get(&self, key: &str) -> Result<u64, QueueError> {
        let conn = self.lock()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM counters WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        Ok(value.unwrap_or(0) as u64)
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), QueueError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO counters (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value as i64],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: u64,
        new: u64,
    ) -> Result<bool, QueueError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO counters (key, value) VALUES (?, 0)",
            params![key],
        )
        .map_err(store_err)?;
        let changed = conn
            .execute(
                "UPDATE counters SET value = ?1 WHERE key = ?2 AND value = ?3",
                params![new as i64, key, expected as i64],
            )
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn increment(&self, key: &str) -> Result<u64, QueueError> {
        let conn = self.lock()?;
        let value: i64 = conn
            .query_row(
                "INSERT INTO counters (key, value) VALUES (?, 1) ON CONFLICT(key) DO UPDATE SET value = value + 1 RETURNING value",
                params![key],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(value as u64)
    }
}

fn store_err(e: rusqlite::Error) -> QueueError {
    QueueError::StoreUnavailable(e.to_string())
}
