//! SQLite key-value store implementation.

use crate::counters::parse_count;
use crate::{KeyValueStore, Namespace, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;

const UPSERT: &str = "INSERT INTO kv (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

/// SQLite-backed key-value store.
///
/// A file-backed store survives restarts; an in-memory one lives as long as
/// the process and plays the role of session-scoped storage.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a persistent store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create a session-scoped store that disappears with the process.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

fn read_count(conn: &Connection, key: &str) -> Result<u64> {
    let current: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(current.as_deref().map(parse_count).unwrap_or(0))
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(UPSERT, params![key, value])?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    fn increment(&mut self, key: &str) -> Result<u64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let next = read_count(&tx, key)? + 1;
        tx.execute(UPSERT, params![key, next.to_string()])?;
        tx.commit()?;
        Ok(next)
    }

    /// Read the count, write the entry, and bump the count inside one
    /// immediate transaction, so writers sharing the database file never
    /// hand out the same index.
    fn append(&mut self, ns: Namespace, value: &str) -> Result<u64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let index = read_count(&tx, ns.count_key())?;
        tx.execute(UPSERT, params![ns.entry_key(index), value])?;
        tx.execute(UPSERT, params![ns.count_key(), (index + 1).to_string()])?;
        tx.commit()?;
        Ok(index)
    }

    fn clear(&mut self, ns: Namespace, count: u64) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut delete = tx.prepare("DELETE FROM kv WHERE key = ?1")?;
            for index in 0..count {
                delete.execute([ns.entry_key(index)])?;
            }
        }
        tx.execute(UPSERT, params![ns.count_key(), "0"])?;
        tx.commit()?;
        Ok(())
    }
}
