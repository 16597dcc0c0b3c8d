// ABOUTME: Conversation session: one document actor plus the orchestrator wired to it.
// ABOUTME: The single place where store, tools, instructions, and the save hook are assembled.

use std::sync::Arc;

use apiwright_core::{DocumentHandle, PersistenceError, PersistenceGateway, ValidationGate, actor};

use crate::context::DocumentInstructions;
use crate::hooks::SaveOnCompletion;
use crate::invoker::ToolInvoker;
use crate::orchestrator::RunOrchestrator;
use crate::transport::ModelTransport;

pub struct Session {
    pub document: DocumentHandle,
    pub orchestrator: RunOrchestrator,
}

impl Session {
    /// Load the conversation's document and wire a turn orchestrator around it.
    pub async fn open(
        conversation_id: &str,
        gateway: Arc<dyn PersistenceGateway>,
        validation: ValidationGate,
        transport: Arc<dyn ModelTransport>,
        model: &str,
    ) -> Result<Self, PersistenceError> {
        tracing::debug!(
            conversation_id,
            storage = %gateway.describe(),
            "opening session"
        );
        let document = actor::open(conversation_id, gateway, validation).await?;
        Ok(Self::with_document(conversation_id, document, transport, model))
    }

    /// Wire a turn orchestrator around an already running document actor.
    pub fn with_document(
        conversation_id: &str,
        document: DocumentHandle,
        transport: Arc<dyn ModelTransport>,
        model: &str,
    ) -> Self {
        let orchestrator = RunOrchestrator::new(
            conversation_id,
            model,
            transport,
            Arc::new(ToolInvoker::for_document(&document)),
            Arc::new(DocumentInstructions::new(document.clone())),
            Arc::new(SaveOnCompletion::new(document.clone())),
        );
        Self {
            document,
            orchestrator,
        }
    }
}
