// ABOUTME: Model transport seam: conversations, messages, and tool-calling runs on a hosted assistant.
// ABOUTME: Defines the run/message/tool-call types the orchestrator drives and the ModelTransport trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The conversation still has an active run, so it cannot take new messages.
    #[error("conversation {conversation_id} has an active run")]
    RunActive { conversation_id: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("run stream ended before the run halted")]
    StreamEnded,

    #[error("timed out waiting for run {0}")]
    Timeout(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A text message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// A message to append to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A function call the model wants executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

/// The string result of one executed tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Raw lifecycle status reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

/// The orchestrator's collapsed view of a run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    InProgress,
    NeedsToolOutputs,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn phase(self) -> RunPhase {
        match self {
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => {
                RunPhase::InProgress
            }
            RunStatus::RequiresAction => RunPhase::NeedsToolOutputs,
            RunStatus::Completed => RunPhase::Completed,
            RunStatus::Cancelled
            | RunStatus::Failed
            | RunStatus::Incomplete
            | RunStatus::Expired => RunPhase::Failed,
        }
    }

    /// True once the run has stopped and is waiting on nobody but us.
    pub fn is_halted(self) -> bool {
        self.phase() != RunPhase::InProgress
    }
}

/// A snapshot of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    /// Calls awaiting outputs; only populated when `status` is `RequiresAction`.
    #[serde(default)]
    pub pending_tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// A function the model may call, as published in the run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Everything a run is started with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

/// Incremental output from a streaming run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    TextDelta { message_id: String, text: String },
    MessageCompleted(Message),
    Status(Run),
}

pub type RunEventStream = Pin<Box<dyn Stream<Item = Result<RunEvent, TransportError>> + Send>>;

/// Options for listing runs or messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: u32,
    pub newest_first: bool,
}

impl ListOptions {
    pub fn latest(limit: u32) -> Self {
        Self {
            limit,
            newest_first: true,
        }
    }
}

/// A hosted conversation + tool-calling run service.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Create an empty conversation and return its id.
    async fn create_conversation(&self) -> Result<String, TransportError>;

    /// Append a message. Fails with [`TransportError::RunActive`] while a run is active.
    async fn create_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> Result<Message, TransportError>;

    async fn list_messages(
        &self,
        conversation_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Message>, TransportError>;

    async fn list_runs(
        &self,
        conversation_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Run>, TransportError>;

    async fn cancel_run(&self, conversation_id: &str, run_id: &str) -> Result<Run, TransportError>;

    /// Start a run and wait until it halts.
    async fn create_run_and_poll(
        &self,
        conversation_id: &str,
        request: &RunRequest,
    ) -> Result<Run, TransportError>;

    /// Start a run and stream its events. The last status event carries the halted run.
    async fn stream_run(
        &self,
        conversation_id: &str,
        request: &RunRequest,
    ) -> Result<RunEventStream, TransportError>;

    /// Resume a run waiting on tool outputs and wait until it halts again.
    async fn submit_tool_outputs_and_poll(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, TransportError>;

    /// Resume a run waiting on tool outputs and stream its events.
    async fn submit_tool_outputs_stream(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunEventStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_collapse_into_phases() {
        assert_eq!(RunStatus::Queued.phase(), RunPhase::InProgress);
        assert_eq!(RunStatus::Cancelling.phase(), RunPhase::InProgress);
        assert_eq!(RunStatus::RequiresAction.phase(), RunPhase::NeedsToolOutputs);
        assert_eq!(RunStatus::Completed.phase(), RunPhase::Completed);
        for failed in [
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Expired,
            RunStatus::Incomplete,
        ] {
            assert_eq!(failed.phase(), RunPhase::Failed);
            assert!(failed.is_halted());
        }
        assert!(!RunStatus::InProgress.is_halted());
    }

    #[test]
    fn run_status_uses_wire_names() {
        let status: RunStatus = serde_json::from_str("\"requires_action\"").unwrap();
        assert_eq!(status, RunStatus::RequiresAction);
    }
}
