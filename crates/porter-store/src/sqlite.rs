//! SQLite-backed persistent store.
//!
//! One `objects` table keyed by (family, id). Every [`write_many`] runs in
//! a single transaction, which is what makes batch commits atomic for
//! concurrent readers and crashes alike. Re-puts use INSERT OR REPLACE;
//! keys are content-derived, so replacing can only rewrite equal content.

use bytes::Bytes;
use porter_core::ObjectId;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::store::{Family, Put, Store, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at `path`. Parent directories are created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Fully in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Number of records in one family.
    pub fn count(&self, family: Family) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare_cached("SELECT COUNT(*) FROM objects WHERE family = ?1")?;
        let n: i64 = stmt.query_row(params![family.code()], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // journal_mode returns a result row, so query it rather than execute.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS objects (
                 family INTEGER NOT NULL,
                 id     BLOB NOT NULL,
                 data   BLOB NOT NULL,
                 PRIMARY KEY (family, id)
             );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl Store for SqliteStore {
    fn get(&self, family: Family, id: &ObjectId) -> Result<Option<Bytes>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt =
            conn.prepare_cached("SELECT data FROM objects WHERE family = ?1 AND id = ?2")?;
        let row = stmt
            .query_row(params![family.code(), id.as_bytes().as_slice()], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(row.map(Bytes::from))
    }

    fn write_many(&self, puts: Vec<Put>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO objects (family, id, data) VALUES (?1, ?2, ?3)",
            )?;
            for put in &puts {
                stmt.execute(params![
                    put.family.code(),
                    put.id.as_bytes().as_slice(),
                    put.data.as_ref()
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
