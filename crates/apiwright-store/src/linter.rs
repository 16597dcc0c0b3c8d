// ABOUTME: Diagnostic producer that shells out to an external OpenAPI linter with JSON output.
// ABOUTME: Writes the document to a temp file, runs the command on it, and parses spectral-style results.

use std::path::Path;

use apiwright_core::{Diagnostic, DiagnosticProducer, Document, ValidationError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use ulid::Ulid;

/// Runs e.g. `spectral lint -f json` with the document path appended.
#[derive(Debug, Clone)]
pub struct ExternalLinter {
    program: String,
    args: Vec<String>,
}

#[derive(Deserialize)]
struct LintResult {
    code: Value,
    message: String,
    #[serde(default)]
    path: Vec<Value>,
    severity: u8,
}

fn segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse the linter's JSON array into diagnostics.
pub fn parse_report(stdout: &str) -> Result<Vec<Diagnostic>, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let results: Vec<LintResult> = serde_json::from_str(stdout)?;
    Ok(results
        .into_iter()
        .map(|r| Diagnostic {
            code: segment(&r.code),
            message: r.message,
            path: r.path.iter().map(segment).collect(),
            severity: r.severity,
        })
        .collect())
}

impl ExternalLinter {
    /// Build from a whitespace-separated command line. None if it is blank.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    fn failure(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::Producer {
            producer: self.program.clone(),
            message: message.into(),
        }
    }

    async fn run_on(&self, path: &Path) -> Result<Vec<Diagnostic>, ValidationError> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .await
            .map_err(|e| self.failure(format!("could not start: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        // A non-zero exit only means findings were reported.
        parse_report(&stdout).map_err(|e| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            self.failure(format!(
                "unparseable output ({e}), exit status {}: {}",
                output.status,
                stderr.trim()
            ))
        })
    }
}

#[async_trait]
impl DiagnosticProducer for ExternalLinter {
    fn name(&self) -> &str {
        &self.program
    }

    async fn diagnose(&self, document: &Document) -> Result<Vec<Diagnostic>, ValidationError> {
        let json = document
            .to_pretty_json()
            .map_err(|e| self.failure(e.to_string()))?;
        let path = std::env::temp_dir().join(format!("apiwright-{}.json", Ulid::new()));
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| self.failure(format!("could not write temp file: {e}")))?;

        let result = self.run_on(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove lint temp file");
        }
        result
    }
}
