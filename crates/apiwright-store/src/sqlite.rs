// ABOUTME: SQLite key-value persistence backend: one row per conversation in a documents table.
// ABOUTME: DocumentDatabase owns the connection and hands out per-key gateways.

use std::path::Path;
use std::sync::{Arc, Mutex};

use apiwright_core::{Document, PersistenceError, PersistenceGateway};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

fn backend(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Backend(e.to_string())
}

/// A SQLite database holding one JSON document per key.
#[derive(Clone)]
pub struct DocumentDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentDatabase {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path).map_err(backend)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(backend)?;
        Self::with_connection(conn)
    }

    /// An in-memory database, gone when the last handle drops.
    pub fn in_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory().map_err(backend)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A gateway bound to `key`.
    pub fn gateway(&self, key: impl Into<String>) -> SqliteGateway {
        SqliteGateway {
            conn: Arc::clone(&self.conn),
            key: key.into(),
        }
    }
}

fn load_row(conn: &Connection, key: &str) -> Result<Option<String>, PersistenceError> {
    conn.query_row(
        "SELECT body FROM documents WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(backend)
}

fn upsert_row(conn: &Connection, key: &str, body: &str) -> Result<(), PersistenceError> {
    conn.execute(
        "INSERT INTO documents (key, body, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
            body = excluded.body,
            updated_at = excluded.updated_at",
        params![key, body, Utc::now().to_rfc3339()],
    )
    .map_err(backend)?;
    Ok(())
}

/// Persists one document under a fixed key.
#[derive(Clone)]
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
    key: String,
}

impl SqliteGateway {
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T, PersistenceError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let key = self.key.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| backend("sqlite connection lock poisoned"))?;
            f(&guard, &key)
        })
        .await
        .map_err(backend)?
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn read(&self) -> Result<Document, PersistenceError> {
        self.with_conn(|conn, key| match load_row(conn, key)? {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => {
                let document = Document::default();
                upsert_row(conn, key, &document.to_pretty_json()?)?;
                tracing::info!(key, "seeded default document");
                Ok(document)
            }
        })
        .await
    }

    async fn write(&self, document: &Document) -> Result<(), PersistenceError> {
        let body = document.to_pretty_json()?;
        self.with_conn(move |conn, key| upsert_row(conn, key, &body))
            .await
    }

    fn describe(&self) -> String {
        format!("sqlite:documents/{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn first_read_seeds_row() {
        let db = DocumentDatabase::in_memory().unwrap();
        let gateway = db.gateway("conv-1");

        assert_eq!(gateway.read().await.unwrap(), Document::default());
        let count: i64 = db
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let db = DocumentDatabase::in_memory().unwrap();
        let a = db.gateway("a");
        let b = db.gateway("b");

        let mut doc = Document::default();
        doc.info.title = "Only A".to_string();
        a.write(&doc).await.unwrap();

        assert_eq!(a.read().await.unwrap().info.title, "Only A");
        assert_eq!(b.read().await.unwrap().info.title, "My API");
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("documents.db");

        let mut doc = Document::default();
        doc.info.version = "2.0.0".to_string();
        DocumentDatabase::open(&path)
            .unwrap()
            .gateway("conv")
            .write(&doc)
            .await
            .unwrap();

        let reopened = DocumentDatabase::open(&path).unwrap().gateway("conv");
        assert_eq!(reopened.read().await.unwrap().info.version, "2.0.0");
    }
}
