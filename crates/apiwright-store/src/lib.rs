// ABOUTME: Persistence backends for apiwright documents and the external linter bridge.
// ABOUTME: Storage picks the file or SQLite backend from settings and hands out per-conversation gateways.

pub mod file;
pub mod linter;
pub mod sqlite;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use apiwright_core::{PersistenceError, PersistenceGateway};
use thiserror::Error;

pub use file::FileGateway;
pub use linter::ExternalLinter;
pub use sqlite::{DocumentDatabase, SqliteGateway};

/// Which backend documents are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// One JSON file at a fixed path, shared by every conversation.
    #[default]
    File,
    /// A SQLite key-value table keyed by conversation id.
    Sqlite,
}

#[derive(Debug, Error)]
#[error("unknown storage adapter \"{0}\", expected file, local, sqlite, or kv")]
pub struct UnknownStorageKind(String);

impl FromStr for StorageKind {
    type Err = UnknownStorageKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "local" => Ok(StorageKind::File),
            "sqlite" | "kv" => Ok(StorageKind::Sqlite),
            _ => Err(UnknownStorageKind(s.to_string())),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::File => f.write_str("file"),
            StorageKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub kind: StorageKind,
    /// Document path for the file backend.
    pub openapi_path: PathBuf,
    /// Database path for the SQLite backend.
    pub database_path: PathBuf,
}

/// An opened storage backend.
#[derive(Clone)]
pub enum Storage {
    File(FileGateway),
    Sqlite(DocumentDatabase),
}

impl Storage {
    pub fn open(settings: &StorageSettings) -> Result<Self, PersistenceError> {
        let storage = match settings.kind {
            StorageKind::File => Storage::File(FileGateway::new(&settings.openapi_path)),
            StorageKind::Sqlite => Storage::Sqlite(DocumentDatabase::open(&settings.database_path)?),
        };
        tracing::info!(kind = %settings.kind, "opened document storage");
        Ok(storage)
    }

    /// The gateway for one conversation. The file backend ignores the id.
    pub fn gateway(&self, conversation_id: &str) -> Arc<dyn PersistenceGateway> {
        match self {
            Storage::File(gateway) => Arc::new(gateway.clone()),
            Storage::Sqlite(db) => Arc::new(db.gateway(conversation_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn storage_kind_aliases() {
        assert_eq!("file".parse::<StorageKind>().unwrap(), StorageKind::File);
        assert_eq!("LOCAL".parse::<StorageKind>().unwrap(), StorageKind::File);
        assert_eq!("kv".parse::<StorageKind>().unwrap(), StorageKind::Sqlite);
        assert_eq!("sqlite".parse::<StorageKind>().unwrap(), StorageKind::Sqlite);
        assert!("s3".parse::<StorageKind>().is_err());
    }

    #[tokio::test]
    async fn file_storage_shares_one_document() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(&StorageSettings {
            kind: StorageKind::File,
            openapi_path: dir.path().join("openapi.json"),
            database_path: dir.path().join("documents.db"),
        })
        .unwrap();

        let mut doc = storage.gateway("a").read().await.unwrap();
        doc.info.title = "Shared".to_string();
        storage.gateway("a").write(&doc).await.unwrap();
        assert_eq!(storage.gateway("b").read().await.unwrap().info.title, "Shared");
        assert!(!dir.path().join("documents.db").exists());
    }

    #[tokio::test]
    async fn sqlite_storage_keys_by_conversation() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(&StorageSettings {
            kind: StorageKind::Sqlite,
            openapi_path: dir.path().join("openapi.json"),
            database_path: dir.path().join("home").join("documents.db"),
        })
        .unwrap();

        let mut doc = storage.gateway("a").read().await.unwrap();
        doc.info.title = "Only A".to_string();
        storage.gateway("a").write(&doc).await.unwrap();
        assert_eq!(storage.gateway("b").read().await.unwrap().info.title, "My API");
        assert_eq!(
            storage.gateway("a").describe(),
            "sqlite:documents/a".to_string()
        );
    }
}
