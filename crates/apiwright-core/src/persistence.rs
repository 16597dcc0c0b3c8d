// ABOUTME: Persistence gateway trait: the durable read/write seam behind the save gate.
// ABOUTME: Backends bind their storage key at construction and seed the default document on first read.

use async_trait::async_trait;
use thiserror::Error;

use crate::document::Document;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable storage for one document.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Load the stored document. A missing document is not an error: the
    /// backend stores and returns [`Document::default`].
    async fn read(&self) -> Result<Document, PersistenceError>;

    /// Durably replace the stored document.
    async fn write(&self, document: &Document) -> Result<(), PersistenceError>;

    /// Human-readable location for logs, e.g. a file path or table key.
    fn describe(&self) -> String;
}
