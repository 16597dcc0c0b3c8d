// ABOUTME: Builds run instructions: the assistant's system prompt plus the current document as pretty JSON.
// ABOUTME: Rebuilt on every run start so the model always sees the latest working document.

use apiwright_core::DocumentHandle;
use async_trait::async_trait;

use crate::orchestrator::InstructionsProvider;

/// Heading that separates the system prompt from the embedded document.
pub const DOCUMENT_HEADING: &str = "## Current OpenAPI Specification:";

pub const SYSTEM_PROMPT: &str = "You are apiwright, an API design assistant. You help people who may \
not be engineers describe the backend they need, and you turn that conversation into a complete \
OpenAPI 3.1.0 document.\n\n\
Work in this order: agree on the use cases and domain entities, define schema components for the \
entities, add reusable responses, parameters, examples and request bodies, then define the endpoint \
operations. Every operation needs an operationId, at least one declared tag, a summary, a \
description, and its responses. Document business rules and implementation notes in the \
operation's `x-implementation-details` field.\n\n\
Add a component before referencing it, and remove every reference to a component before removing \
it. Call Validate-Spec after larger changes and fix what it reports. Changes you make with the tools \
are saved automatically when the document is valid; when a save fails, fix the listed problems.\n\n\
Keep replies short and plain. Make sensible assumptions, suggest improvements when they matter, and \
confirm the design with the user before finishing.";

#[async_trait]
impl InstructionsProvider for DocumentInstructions {
    async fn instructions(&self) -> String {
        // A document that cannot be read still gets the prompt; the tools report NotLoaded.
        let body = match self.document.document().await {
            Ok(doc) => doc.to_pretty_json().unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    conversation_id = %self.document.conversation_id,
                    error = %e,
                    "document unavailable while building instructions"
                );
                String::new()
            }
        };
        format!("{}\n\n{DOCUMENT_HEADING}\n{body}", self.prompt)
    }
}

/// Instructions for one conversation's document.
#[derive(Clone)]
pub struct DocumentInstructions {
    prompt: String,
    document: DocumentHandle,
}

impl DocumentInstructions {
    pub fn new(document: DocumentHandle) -> Self {
        Self::with_prompt(SYSTEM_PROMPT, document)
    }

    pub fn with_prompt(prompt: impl Into<String>, document: DocumentHandle) -> Self {
        Self {
            prompt: prompt.into(),
            document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec_tools::test_support;
    use apiwright_core::{DocumentCommand, Tag};

    #[tokio::test]
    async fn instructions_embed_latest_document() {
        let (document, _) = test_support::document().await;
        let provider = DocumentInstructions::with_prompt("Be brief.", document.clone());

        let before = provider.instructions().await;
        assert!(before.starts_with("Be brief.\n\n## Current OpenAPI Specification:\n{"));
        assert!(before.contains("\"openapi\": \"3.1.0\""));
        assert!(!before.contains("billing"));

        document
            .apply(DocumentCommand::SetTags(vec![Tag {
                name: "billing".to_string(),
                ..Tag::default()
            }]))
            .await
            .unwrap();
        assert!(provider.instructions().await.contains("\"billing\""));
    }

    #[test]
    fn default_prompt_mentions_tools() {
        assert!(SYSTEM_PROMPT.contains("Validate-Spec"));
        assert!(SYSTEM_PROMPT.contains("x-implementation-details"));
    }
}
