//! SQLite-based reference store.
//!
//! One row per key; the reference list is stored as a JSON array.

use super::{ReferenceStore, StoredReferences};
use crate::error::{ReelError, Result};
use crate::generator::VideoReference;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS video_references (
        key TEXT PRIMARY KEY,
        references_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

pub struct SqliteReferenceStore {
    conn: Mutex<Connection>,
}

impl SqliteReferenceStore {
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized reference store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReelError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn read(conn: &Connection, key: &str) -> Result<Option<StoredReferences>> {
        let row = conn
            .query_row(
                "SELECT references_json, updated_at FROM video_references WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((json, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredReferences {
            key: key.to_string(),
            references: serde_json::from_str(&json)?,
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    fn write(conn: &Connection, key: &str, references: &[VideoReference]) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO video_references (key, references_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                references_json = excluded.references_json,
                updated_at = excluded.updated_at
            "#,
            params![key, serde_json::to_string(references)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ReferenceStore for SqliteReferenceStore {
    #[instrument(skip(self, references))]
    async fn put(&self, key: &str, references: &[VideoReference]) -> Result<()> {
        let conn = self.lock()?;
        Self::write(&conn, key, references)?;
        debug!("Stored {} references under {}", references.len(), key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredReferences>> {
        let conn = self.lock()?;
        Self::read(&conn, key)
    }

    #[instrument(skip(self, reference))]
    async fn append(&self, key: &str, reference: &VideoReference) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut references = Self::read(&tx, key)?
            .map(|s| s.references)
            .unwrap_or_default();
        references.push(reference.clone());
        Self::write(&tx, key, &references)?;
        tx.commit()?;
        Ok(references.len())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM video_references ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
