// ABOUTME: Save gate: validates the document and only then writes it through the persistence gateway.
// ABOUTME: Remembers the last saved revision so an unchanged document is not written twice.

use std::sync::Arc;

use thiserror::Error;

use crate::document::Document;
use crate::persistence::{PersistenceError, PersistenceGateway};
use crate::validation::{Diagnostic, ValidationError, ValidationGate, render_diagnostics};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("document is not loaded")]
    NotLoaded,

    #[error("invalid OpenAPI document:\n{}", render_diagnostics(.0))]
    ValidationFailed(Vec<Diagnostic>),

    #[error(transparent)]
    Validator(#[from] ValidationError),

    #[error("failed to write document: {0}")]
    Io(#[from] PersistenceError),

    #[error("document actor channel closed")]
    ChannelClosed,
}

/// Result of a save attempt that did not fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// False when the save was skipped because nothing changed.
    pub written: bool,
    /// Non-blocking findings from the validation pass.
    pub advisories: Vec<Diagnostic>,
}

impl SaveReport {
    fn skipped() -> Self {
        Self::default()
    }
}

pub struct SaveGate {
    validation: ValidationGate,
    gateway: Arc<dyn PersistenceGateway>,
    saved_revision: Option<u64>,
}

impl SaveGate {
    pub fn new(validation: ValidationGate, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            validation,
            gateway,
            saved_revision: None,
        }
    }

    /// Record that `revision` matches what is already in storage.
    pub fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = Some(revision);
    }

    pub fn validation(&self) -> &ValidationGate {
        &self.validation
    }

    /// Validate, then write. Blocking diagnostics abort before any write.
    pub async fn save(&mut self, document: &Document, revision: u64) -> Result<SaveReport, SaveError> {
        let diagnostics = self.validation.validate(document).await?;
        let (blocking, advisories): (Vec<Diagnostic>, Vec<Diagnostic>) = diagnostics
            .into_iter()
            .partition(|d| self.validation.is_blocking(d));

        if !blocking.is_empty() {
            tracing::warn!(
                blocking = blocking.len(),
                storage = %self.gateway.describe(),
                "refusing to save document with blocking diagnostics"
            );
            return Err(SaveError::ValidationFailed(blocking));
        }

        self.gateway.write(document).await?;
        self.saved_revision = Some(revision);
        tracing::info!(
            revision,
            advisories = advisories.len(),
            storage = %self.gateway.describe(),
            "document saved"
        );
        Ok(SaveReport {
            written: true,
            advisories,
        })
    }

    /// Like [`SaveGate::save`], but a no-op when `revision` was already saved.
    pub async fn save_if_dirty(
        &mut self,
        document: &Document,
        revision: u64,
    ) -> Result<SaveReport, SaveError> {
        if self.saved_revision == Some(revision) {
            tracing::debug!(revision, "document unchanged since last save");
            return Ok(SaveReport::skipped());
        }
        self.save(document, revision).await
    }
}
