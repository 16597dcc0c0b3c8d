// ABOUTME: Validation gate: runs a diagnostic producer over a document and decides whether it may be saved.
// ABOUTME: Filters vendor-noise diagnostics and treats findings at or below the blocking severity as errors.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;

/// Diagnostic codes starting with this prefix come from a vendor ruleset
/// and are dropped before any decision is made.
pub const VENDOR_NOISE_PREFIX: &str = "ibm";

/// Severity at or below which a diagnostic blocks saving. Zero is "error".
pub const DEFAULT_BLOCKING_SEVERITY: u8 = 0;

pub const SEVERITY_ERROR: u8 = 0;
pub const SEVERITY_WARNING: u8 = 1;
pub const SEVERITY_INFO: u8 = 2;
pub const SEVERITY_HINT: u8 = 3;

/// A single finding about the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    /// JSON path segments to the offending node.
    #[serde(default)]
    pub path: Vec<String>,
    /// 0 = error, 1 = warning, 2 = info, 3 = hint.
    pub severity: u8,
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>, path: Vec<String>, severity: u8) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            path,
            severity,
        }
    }

    fn is_vendor_noise(&self) -> bool {
        self.code.starts_with(VENDOR_NOISE_PREFIX)
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("diagnostic producer {producer} failed: {message}")]
    Producer { producer: String, message: String },
}

/// Anything that can inspect a document and report findings.
#[async_trait]
pub trait DiagnosticProducer: Send + Sync {
    fn name(&self) -> &str;
    async fn diagnose(&self, document: &Document) -> Result<Vec<Diagnostic>, ValidationError>;
}

/// Decides whether a document is clean enough to persist.
#[derive(Clone)]
pub struct ValidationGate {
    producer: Arc<dyn DiagnosticProducer>,
    blocking_severity: u8,
}

impl ValidationGate {
    pub fn new(producer: Arc<dyn DiagnosticProducer>) -> Self {
        Self {
            producer,
            blocking_severity: DEFAULT_BLOCKING_SEVERITY,
        }
    }

    pub fn with_blocking_severity(mut self, severity: u8) -> Self {
        self.blocking_severity = severity;
        self
    }

    pub fn blocking_severity(&self) -> u8 {
        self.blocking_severity
    }

    pub fn producer_name(&self) -> &str {
        self.producer.name()
    }

    /// Run the producer and return every diagnostic that is not vendor noise.
    pub async fn validate(&self, document: &Document) -> Result<Vec<Diagnostic>, ValidationError> {
        let mut diagnostics = self.producer.diagnose(document).await?;
        diagnostics.retain(|d| !d.is_vendor_noise());
        tracing::debug!(
            producer = self.producer.name(),
            count = diagnostics.len(),
            "validated document"
        );
        Ok(diagnostics)
    }

    pub fn is_blocking(&self, diagnostic: &Diagnostic) -> bool {
        diagnostic.severity <= self.blocking_severity
    }

    /// The subset of `diagnostics` that would prevent a save.
    pub fn blocking<'a>(&self, diagnostics: &'a [Diagnostic]) -> Vec<&'a Diagnostic> {
        diagnostics.iter().filter(|d| self.is_blocking(d)).collect()
    }

    /// True iff validation produces no blocking diagnostic.
    pub async fn can_save(&self, document: &Document) -> Result<bool, ValidationError> {
        let diagnostics = self.validate(document).await?;
        Ok(self.blocking(&diagnostics).is_empty())
    }
}

#[derive(Serialize)]
struct RenderedDiagnostic<'a> {
    code: &'a str,
    message: &'a str,
    path: String,
}

/// Render diagnostics as a YAML list of code, message, and dotted path.
pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "No issues found.\n".to_string();
    }
    let rendered: Vec<RenderedDiagnostic<'_>> = diagnostics
        .iter()
        .map(|d| RenderedDiagnostic {
            code: &d.code,
            message: &d.message,
            path: d.path.join("."),
        })
        .collect();
    serde_yaml::to_string(&rendered).unwrap_or_else(|_| {
        diagnostics
            .iter()
            .map(|d| format!("- {}: {}\n", d.code, d.message))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Diagnostic>);

    #[async_trait]
    impl DiagnosticProducer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn diagnose(&self, _document: &Document) -> Result<Vec<Diagnostic>, ValidationError> {
            Ok(self.0.clone())
        }
    }

    fn gate(diagnostics: Vec<Diagnostic>) -> ValidationGate {
        ValidationGate::new(Arc::new(Fixed(diagnostics)))
    }

    #[tokio::test]
    async fn vendor_noise_is_filtered() {
        let gate = gate(vec![
            Diagnostic::new("ibm-schema-description", "noise", vec![], SEVERITY_ERROR),
            Diagnostic::new("info-title", "missing", vec!["info".into()], SEVERITY_WARNING),
        ]);
        let found = gate.validate(&Document::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "info-title");
    }

    #[tokio::test]
    async fn only_errors_block_by_default() {
        let warnings = gate(vec![Diagnostic::new("w", "warn", vec![], SEVERITY_WARNING)]);
        assert!(warnings.can_save(&Document::default()).await.unwrap());

        let errors = gate(vec![Diagnostic::new("e", "err", vec![], SEVERITY_ERROR)]);
        assert!(!errors.can_save(&Document::default()).await.unwrap());
    }

    #[tokio::test]
    async fn vendor_errors_never_block() {
        let gate = gate(vec![Diagnostic::new("ibm-x", "noise", vec![], SEVERITY_ERROR)]);
        assert!(gate.can_save(&Document::default()).await.unwrap());
    }

    #[tokio::test]
    async fn raised_threshold_blocks_warnings() {
        let gate = gate(vec![Diagnostic::new("w", "warn", vec![], SEVERITY_WARNING)])
            .with_blocking_severity(SEVERITY_WARNING);
        assert!(!gate.can_save(&Document::default()).await.unwrap());
    }

    #[test]
    fn render_lists_code_message_and_path() {
        let yaml = render_diagnostics(&[Diagnostic::new(
            "operation-id",
            "operationId must not be empty",
            vec!["paths".into(), "/users".into(), "get".into()],
            SEVERITY_ERROR,
        )]);
        assert!(yaml.contains("code: operation-id"));
        assert!(yaml.contains("paths./users.get"));
        assert_eq!(render_diagnostics(&[]), "No issues found.\n");
    }
}
