//! Persistence adapters for record collections.

use chrono::Utc;
use parking_lot::Mutex;
use rooster_core::RusqliteErrorExt;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::types::Record;

/// Load-all / write-back persistence for one kind of record.
pub trait RecordStorage<R: Record>: Send {
    fn load_all(&self) -> StorageResult<Vec<R>>;

    /// Insert or replace `records`.
    fn save(&self, records: &[R]) -> StorageResult<()>;

    fn delete(&self, ids: &[String]) -> StorageResult<()>;
}

/// SQLite-backed storage. Records of one namespace share a table with other
/// namespaces and are stored as JSON bodies.
pub struct SqliteStorage {
    conn: Connection,
    namespace: String,
}

impl SqliteStorage {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, namespace: &str) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| e.into_database_error())?;
        Self::with_connection(conn, namespace)
    }

    /// Create an in-memory storage (for testing).
    pub fn in_memory(namespace: &str) -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| e.into_database_error())?;
        Self::with_connection(conn, namespace)
    }

    fn with_connection(conn: Connection, namespace: &str) -> StorageResult<Self> {
        let storage = Self {
            conn,
            namespace: namespace.to_string(),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS records (
                    namespace TEXT NOT NULL,
                    id TEXT NOT NULL,
                    body TEXT NOT NULL,
                    stored_at INTEGER NOT NULL,
                    PRIMARY KEY (namespace, id)
                );

                CREATE INDEX IF NOT EXISTS idx_records_namespace ON records(namespace);
                "#,
            )
            .map_err(|e| e.into_database_error())?;
        Ok(())
    }

    /// Number of records stored under this namespace.
    pub fn count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE namespace = ?1",
                params![self.namespace],
                |row| row.get(0),
            )
            .map_err(|e| e.into_database_error())?;
        Ok(count as usize)
    }
}

impl<R: Record> RecordStorage<R> for SqliteStorage {
    fn load_all(&self) -> StorageResult<Vec<R>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, body FROM records WHERE namespace = ?1 ORDER BY id")
            .map_err(|e| e.into_database_error())?;

        let rows = stmt
            .query_map(params![self.namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| e.into_database_error())?;

        let mut records = Vec::new();
        for row in rows {
            let (id, body) = row.map_err(|e| e.into_database_error())?;
            match serde_json::from_str::<R>(&body) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(namespace = %self.namespace, %id, "Skipping unreadable record: {}", e);
                }
            }
        }
        Ok(records)
    }

    fn save(&self, records: &[R]) -> StorageResult<()> {
        let now = Utc::now().timestamp_millis();
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| e.into_database_error())?;

        for record in records {
            let body = serde_json::to_string(record)?;
            tx.execute(
                "INSERT OR REPLACE INTO records (namespace, id, body, stored_at) VALUES (?1, ?2, ?3, ?4)",
                params![self.namespace, record.id(), body, now],
            )
            .map_err(|e| e.into_database_error())?;
        }

        tx.commit().map_err(|e| e.into_database_error())?;
        tracing::debug!(namespace = %self.namespace, count = records.len(), "Saved records");
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> StorageResult<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| e.into_database_error())?;

        for id in ids {
            tx.execute(
                "DELETE FROM records WHERE namespace = ?1 AND id = ?2",
                params![self.namespace, id],
            )
            .map_err(|e| e.into_database_error())?;
        }

        tx.commit().map_err(|e| e.into_database_error())?;
        tracing::debug!(namespace = %self.namespace, count = ids.len(), "Deleted records");
        Ok(())
    }
}

/// Storage kept in memory. Clones share the same contents, so a test can keep
/// a handle while a store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bodies: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bodies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.lock().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bodies.lock().contains_key(id)
    }
}

impl<R: Record> RecordStorage<R> for MemoryStorage {
    fn load_all(&self) -> StorageResult<Vec<R>> {
        self.bodies
            .lock()
            .values()
            .map(|body| serde_json::from_str(body).map_err(StorageError::from))
            .collect()
    }

    fn save(&self, records: &[R]) -> StorageResult<()> {
        let encoded = records
            .iter()
            .map(|r| -> StorageResult<(String, String)> {
                Ok((r.id().to_string(), serde_json::to_string(r)?))
            })
            .collect::<StorageResult<Vec<_>>>()?;
        self.bodies.lock().extend(encoded);
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> StorageResult<()> {
        let mut bodies = self.bodies.lock();
        for id in ids {
            bodies.remove(id);
        }
        Ok(())
    }
}
