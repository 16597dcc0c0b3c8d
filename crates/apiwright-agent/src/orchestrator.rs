// ABOUTME: Run orchestrator: drives one conversation turn through tool-calling runs to completion.
// ABOUTME: Executes each tool batch exactly once, runs the after-run hook, and bounds self-correction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::invoker::ToolInvoker;
use crate::transport::{
    ListOptions, Message, ModelTransport, NewMessage, Role, Run, RunEvent, RunEventStream,
    RunPhase, RunRequest, RunStatus, ToolCall, ToolOutput, TransportError,
};

/// Correction rounds allowed per turn before giving up on saving.
pub const MAX_CORRECTION_ATTEMPTS: u32 = 3;

/// Supplies the instructions a run is started with.
#[async_trait]
pub trait InstructionsProvider: Send + Sync {
    async fn instructions(&self) -> String;
}

/// What the after-run hook decided about a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterRun {
    Settled,
    NeedsCorrection { reason: String },
}

/// Called once for every run that completes.
#[async_trait]
pub trait AfterRunHook: Send + Sync {
    async fn after_run(&self, run: &Run) -> AfterRun;
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Running,
    AwaitingToolOutputs,
    Completed,
    Failed,
}

/// Per-turn bookkeeping.
#[derive(Debug, Default)]
pub struct TurnState {
    pub phase: TurnPhase,
    pub run_id: Option<String>,
    pub tool_batches: u32,
    pub corrections: u32,
    /// Outputs of the current run by tool call id; a call with an entry here
    /// is never executed again within that run.
    outputs: HashMap<String, ToolOutput>,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed { run_id: String, corrections: u32 },
    /// The run completed but the document could not be saved within the correction budget.
    Unsaved { run_id: String, reason: String },
    Failed { run_id: Option<String>, reason: String },
}

/// Progress notifications for streaming consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    RunStarted { run_id: String },
    TextDelta { message_id: String, text: String },
    MessageCompleted { message: Message },
    ToolCallStarted { tool_call_id: String, tool: String },
    ToolCallFinished { tool_call_id: String, tool: String, output: String },
    CorrectionStarted { attempt: u32, reason: String },
    Finished { outcome: TurnOutcome },
}

type Sink<'a> = Option<&'a mpsc::Sender<TurnEvent>>;

async fn emit(sink: Sink<'_>, event: TurnEvent) {
    if let Some(tx) = sink {
        // A closed receiver only means nobody is watching anymore
        let _ = tx.send(event).await;
    }
}

fn correction_message(reason: &str) -> String {
    format!(
        "The OpenAPI document was not saved because it failed validation. \
         Fix the problems below with the tools, then finish.\n\n{reason}"
    )
}

fn unsaved_message(attempts: u32, reason: &str) -> String {
    format!(
        "The OpenAPI document could not be saved after {attempts} correction attempts. \
         The changes are kept in the working document but are not persisted.\n\n{reason}"
    )
}

/// Drives runs for one conversation.
pub struct RunOrchestrator {
    conversation_id: String,
    model: String,
    transport: Arc<dyn ModelTransport>,
    invoker: Arc<ToolInvoker>,
    instructions: Arc<dyn InstructionsProvider>,
    after_run: Arc<dyn AfterRunHook>,
    max_corrections: u32,
}

impl RunOrchestrator {
    pub fn new(
        conversation_id: impl Into<String>,
        model: impl Into<String>,
        transport: Arc<dyn ModelTransport>,
        invoker: Arc<ToolInvoker>,
        instructions: Arc<dyn InstructionsProvider>,
        after_run: Arc<dyn AfterRunHook>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            model: model.into(),
            transport,
            invoker,
            instructions,
            after_run,
            max_corrections: MAX_CORRECTION_ATTEMPTS,
        }
    }

    pub fn with_max_corrections(mut self, max_corrections: u32) -> Self {
        self.max_corrections = max_corrections;
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Append a user message.
    ///
    /// If the conversation still has an active run, the most recent run is
    /// cancelled and the post retried once. Other errors propagate.
    pub async fn add_message(&self, text: &str) -> Result<Message, OrchestratorError> {
        self.post(NewMessage::user(text)).await
    }

    async fn post(&self, message: NewMessage) -> Result<Message, OrchestratorError> {
        let conv = &self.conversation_id;
        match self.transport.create_message(conv, &message).await {
            Err(TransportError::RunActive { .. }) => {
                tracing::warn!(conversation_id = %conv, "run still active, cancelling it");
                let runs = self.transport.list_runs(conv, ListOptions::latest(1)).await?;
                if let Some(run) = runs.first() {
                    self.transport.cancel_run(conv, &run.id).await?;
                    tracing::info!(conversation_id = %conv, run_id = %run.id, "cancelled run");
                }
                Ok(self.transport.create_message(conv, &message).await?)
            }
            other => Ok(other?),
        }
    }

    /// Run the turn with polling and no progress events.
    pub async fn run_blocking(&self) -> Result<TurnOutcome, OrchestratorError> {
        self.run(None).await
    }

    /// Run the turn streaming, reporting progress on `events`.
    ///
    /// Correction rounds use the blocking path; their final reply is still
    /// reported as a completed message.
    pub async fn run_streaming(
        &self,
        events: mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome, OrchestratorError> {
        self.run(Some(&events)).await
    }

    async fn run(&self, sink: Sink<'_>) -> Result<TurnOutcome, OrchestratorError> {
        let mut state = TurnState::default();
        let result = self.turn(&mut state, sink).await;
        let outcome = match &result {
            Ok(outcome) => outcome.clone(),
            Err(e) => {
                tracing::error!(
                    conversation_id = %self.conversation_id,
                    run_id = ?state.run_id,
                    error = %e,
                    "turn aborted"
                );
                TurnOutcome::Failed {
                    run_id: state.run_id.clone(),
                    reason: e.to_string(),
                }
            }
        };
        emit(sink, TurnEvent::Finished { outcome }).await;
        result
    }

    async fn turn(
        &self,
        state: &mut TurnState,
        sink: Sink<'_>,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let mut run = match sink {
            Some(_) => self.drive_streamed(state, sink).await?,
            None => self.drive_polled(state, sink).await?,
        };

        loop {
            if run.status.phase() != RunPhase::Completed {
                state.phase = TurnPhase::Failed;
                let reason = run
                    .last_error
                    .clone()
                    .unwrap_or_else(|| format!("run ended with status {:?}", run.status));
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    run_id = %run.id,
                    reason = %reason,
                    "run did not complete"
                );
                return Ok(TurnOutcome::Failed {
                    run_id: Some(run.id),
                    reason,
                });
            }
            state.phase = TurnPhase::Completed;

            let reason = match self.after_run.after_run(&run).await {
                AfterRun::Settled => {
                    tracing::info!(
                        conversation_id = %self.conversation_id,
                        run_id = %run.id,
                        corrections = state.corrections,
                        "turn completed"
                    );
                    return Ok(TurnOutcome::Completed {
                        run_id: run.id,
                        corrections: state.corrections,
                    });
                }
                AfterRun::NeedsCorrection { reason } => reason,
            };

            if state.corrections >= self.max_corrections {
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    run_id = %run.id,
                    attempt = state.corrections,
                    "correction budget exhausted"
                );
                let notice = self
                    .post(NewMessage::assistant(unsaved_message(state.corrections, &reason)))
                    .await?;
                emit(sink, TurnEvent::MessageCompleted { message: notice }).await;
                return Ok(TurnOutcome::Unsaved {
                    run_id: run.id,
                    reason,
                });
            }

            state.corrections += 1;
            tracing::info!(
                conversation_id = %self.conversation_id,
                run_id = %run.id,
                attempt = state.corrections,
                "starting correction round"
            );
            emit(
                sink,
                TurnEvent::CorrectionStarted {
                    attempt: state.corrections,
                    reason: reason.clone(),
                },
            )
            .await;
            self.post(NewMessage::assistant(correction_message(&reason)))
                .await?;
            run = self.drive_polled(state, sink).await?;
        }
    }

    async fn request(&self) -> RunRequest {
        RunRequest {
            model: self.model.clone(),
            instructions: self.instructions.instructions().await,
            tools: self.invoker.definitions(),
        }
    }

    async fn started(&self, state: &mut TurnState, run: &Run, sink: Sink<'_>) {
        if state.run_id.as_deref() != Some(run.id.as_str()) {
            state.run_id = Some(run.id.clone());
            tracing::info!(conversation_id = %self.conversation_id, run_id = %run.id, "run started");
            emit(sink, TurnEvent::RunStarted { run_id: run.id.clone() }).await;
        }
    }

    /// Start a polled run and resolve tool batches until it halts elsewhere.
    async fn drive_polled(&self, state: &mut TurnState, sink: Sink<'_>) -> Result<Run, OrchestratorError> {
        let conv = &self.conversation_id;
        let request = self.request().await;
        state.phase = TurnPhase::Running;
        state.outputs.clear();
        let mut run = self.transport.create_run_and_poll(conv, &request).await?;
        self.started(state, &run, sink).await;

        while run.status == RunStatus::RequiresAction {
            let outputs = self.execute_batch(state, &run, sink).await;
            state.phase = TurnPhase::Running;
            run = self
                .transport
                .submit_tool_outputs_and_poll(conv, &run.id, &outputs)
                .await?;
        }

        if sink.is_some() && run.status == RunStatus::Completed {
            let latest = self.transport.list_messages(conv, ListOptions::latest(1)).await?;
            if let Some(message) = latest.into_iter().find(|m| m.role == Role::Assistant) {
                emit(sink, TurnEvent::MessageCompleted { message }).await;
            }
        }
        Ok(run)
    }

    /// Start a streamed run and resolve tool batches until it halts elsewhere.
    async fn drive_streamed(&self, state: &mut TurnState, sink: Sink<'_>) -> Result<Run, OrchestratorError> {
        let conv = &self.conversation_id;
        let request = self.request().await;
        state.phase = TurnPhase::Running;
        state.outputs.clear();
        let stream = self.transport.stream_run(conv, &request).await?;
        let mut run = self.consume(stream, state, sink).await?;

        while run.status == RunStatus::RequiresAction {
            let outputs = self.execute_batch(state, &run, sink).await;
            state.phase = TurnPhase::Running;
            let stream = self
                .transport
                .submit_tool_outputs_stream(conv, &run.id, &outputs)
                .await?;
            run = self.consume(stream, state, sink).await?;
        }
        Ok(run)
    }

    /// Forward stream events until the run halts; returns the halted run.
    async fn consume(
        &self,
        mut stream: RunEventStream,
        state: &mut TurnState,
        sink: Sink<'_>,
    ) -> Result<Run, OrchestratorError> {
        while let Some(event) = stream.next().await {
            match event? {
                RunEvent::TextDelta { message_id, text } => {
                    emit(sink, TurnEvent::TextDelta { message_id, text }).await;
                }
                RunEvent::MessageCompleted(message) => {
                    emit(sink, TurnEvent::MessageCompleted { message }).await;
                }
                RunEvent::Status(run) => {
                    self.started(state, &run, sink).await;
                    if run.status.is_halted() {
                        return Ok(run);
                    }
                }
            }
        }
        Err(TransportError::StreamEnded.into())
    }

    /// Execute the calls of a halted run that have not been executed yet and
    /// return one output per pending call, in call order.
    async fn execute_batch(&self, state: &mut TurnState, run: &Run, sink: Sink<'_>) -> Vec<ToolOutput> {
        state.phase = TurnPhase::AwaitingToolOutputs;
        state.tool_batches += 1;

        let fresh: Vec<&ToolCall> = run
            .pending_tool_calls
            .iter()
            .filter(|call| !state.outputs.contains_key(&call.id))
            .collect();
        tracing::debug!(
            conversation_id = %self.conversation_id,
            run_id = %run.id,
            pending = run.pending_tool_calls.len(),
            fresh = fresh.len(),
            "executing tool batch"
        );

        for call in &fresh {
            emit(
                sink,
                TurnEvent::ToolCallStarted {
                    tool_call_id: call.id.clone(),
                    tool: call.name.clone(),
                },
            )
            .await;
        }
        let results = self.invoker.invoke_all(&fresh).await;
        for (call, output) in fresh.iter().zip(results) {
            emit(
                sink,
                TurnEvent::ToolCallFinished {
                    tool_call_id: call.id.clone(),
                    tool: call.name.clone(),
                    output: output.output.clone(),
                },
            )
            .await;
            state.outputs.insert(call.id.clone(), output);
        }

        run.pending_tool_calls
            .iter()
            .filter_map(|call| state.outputs.get(&call.id).cloned())
            .collect()
    }
}
