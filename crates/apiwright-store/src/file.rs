// ABOUTME: JSON file persistence backend with atomic replace (write .tmp, fsync, rename).
// ABOUTME: Seeds the default document on first read when the file does not exist yet.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use apiwright_core::{Document, PersistenceError, PersistenceGateway};
use async_trait::async_trait;

/// Stores the document as pretty JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct FileGateway {
    path: PathBuf,
}

impl FileGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `contents` next to `path` and atomically rename it into place.
/// Creates the parent directory if it does not exist.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_or_seed(path: &Path) -> Result<Document, PersistenceError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let document = Document::default();
            write_atomic(path, &document.to_pretty_json()?)?;
            tracing::info!(path = %path.display(), "seeded default document");
            Ok(document)
        }
        Err(e) => Err(e.into()),
    }
}

fn join_error(e: tokio::task::JoinError) -> PersistenceError {
    PersistenceError::Backend(format!("blocking task failed: {e}"))
}

#[async_trait]
impl PersistenceGateway for FileGateway {
    async fn read(&self) -> Result<Document, PersistenceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_or_seed(&path))
            .await
            .map_err(join_error)?
    }

    async fn write(&self, document: &Document) -> Result<(), PersistenceError> {
        let json = document.to_pretty_json()?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(join_error)??;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
