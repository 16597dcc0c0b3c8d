// ABOUTME: After-run hook that saves the working document once a run completes.
// ABOUTME: A failed save asks the orchestrator for a correction round with the failure text.

use apiwright_core::DocumentHandle;
use async_trait::async_trait;

use crate::orchestrator::{AfterRun, AfterRunHook};
use crate::transport::Run;

/// Saves the document through the save gate when it changed during the turn.
#[derive(Clone)]
pub struct SaveOnCompletion {
    document: DocumentHandle,
}

impl SaveOnCompletion {
    pub fn new(document: DocumentHandle) -> Self {
        Self { document }
    }
}

#[async_trait]
impl AfterRunHook for SaveOnCompletion {
    async fn after_run(&self, run: &Run) -> AfterRun {
        match self.document.save_if_dirty().await {
            Ok(report) => {
                tracing::debug!(
                    conversation_id = %self.document.conversation_id,
                    run_id = %run.id,
                    written = report.written,
                    "after-run save settled"
                );
                AfterRun::Settled
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %self.document.conversation_id,
                    run_id = %run.id,
                    error = %e,
                    "after-run save failed"
                );
                AfterRun::NeedsCorrection {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec_tools::test_support;
    use crate::transport::RunStatus;
    use apiwright_core::{ComponentKind, DocumentCommand};
    use serde_json::json;

    fn completed() -> Run {
        Run {
            id: "run_1".to_string(),
            status: RunStatus::Completed,
            pending_tool_calls: Vec::new(),
            last_error: None,
        }
    }

    #[tokio::test]
    async fn clean_document_is_not_rewritten() {
        let (document, gateway) = test_support::document().await;
        let hook = SaveOnCompletion::new(document);
        assert_eq!(hook.after_run(&completed()).await, AfterRun::Settled);
        assert_eq!(gateway.write_count(), 0);
    }

    #[tokio::test]
    async fn invalid_document_needs_correction() {
        let (document, gateway) = test_support::document().await;
        document
            .apply(DocumentCommand::UpsertComponent {
                kind: ComponentKind::Schemas,
                name: "Dangling".to_string(),
                value: json!({ "$ref": "#/components/schemas/Missing" }),
            })
            .await
            .unwrap();

        let hook = SaveOnCompletion::new(document);
        match hook.after_run(&completed()).await {
            AfterRun::NeedsCorrection { reason } => assert!(reason.contains("unresolved-ref")),
            other => panic!("expected a correction, got {other:?}"),
        }
        assert_eq!(gateway.write_count(), 0);
    }
}
