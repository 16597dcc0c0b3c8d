// ABOUTME: Test utilities for apiwright-agent: an in-memory persistence gateway and a scripted model transport.
// ABOUTME: Used in tests to drive tool-calling runs without network access or a real disk.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use apiwright_core::{Document, PersistenceError, PersistenceGateway};
use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{
    ListOptions, Message, ModelTransport, NewMessage, Role, Run, RunEvent, RunEventStream,
    RunRequest, RunStatus, ToolCall, ToolOutput, TransportError,
};

/// A persistence gateway that keeps the last written document in memory and counts writes.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    stored: Mutex<Option<Document>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every write fails with a backend error.
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.fail_writes.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn with_document(document: Document) -> Self {
        let gateway = Self::default();
        *gateway.stored.lock().unwrap_or_else(|e| e.into_inner()) = Some(document);
        gateway
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<Document> {
        self.stored.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn read(&self) -> Result<Document, PersistenceError> {
        Ok(self.stored().unwrap_or_default())
    }

    async fn write(&self, document: &Document) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Backend("disk is read-only".to_string()));
        }
        *self.stored.lock().unwrap_or_else(|e| e.into_inner()) = Some(document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// One scripted model turn: what the next run (or resumed run) does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Finish the run with an assistant message.
    Reply(String),
    /// Halt the run asking for these `(tool name, arguments)` calls.
    CallTools(Vec<(String, Value)>),
    /// Like [`Step::CallTools`], with explicit `(call id, tool name, arguments)`.
    CallToolsAs(Vec<(String, String, Value)>),
    /// Fail the run with this error.
    Fail(String),
}

impl Step {
    pub fn reply(text: &str) -> Self {
        Step::Reply(text.to_string())
    }

    pub fn call(name: &str, arguments: Value) -> Self {
        Step::CallTools(vec![(name.to_string(), arguments)])
    }
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    messages: HashMap<String, Vec<Message>>,
    /// Run ids in creation order.
    runs: Vec<Run>,
    run_requests: Vec<RunRequest>,
    submissions: Vec<Vec<ToolOutput>>,
    cancelled: Vec<String>,
    reject_messages: u32,
    counter: u64,
}

impl Script {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}_{}", self.counter)
    }

    fn push_message(&mut self, conversation_id: &str, role: Role, content: String) -> Message {
        let message = Message {
            id: self.next_id("msg"),
            role,
            content,
            created_at: self.counter as i64,
        };
        self.messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    /// Pop the next step and settle `run_id` accordingly.
    fn advance(&mut self, conversation_id: &str, run_id: &str) -> (Run, Option<Message>) {
        let mut reply = None;
        let (status, calls, last_error) = match self.steps.pop_front() {
            Some(Step::Reply(text)) => {
                reply = Some(self.push_message(conversation_id, Role::Assistant, text));
                (RunStatus::Completed, Vec::new(), None)
            }
            Some(Step::CallTools(calls)) => {
                let calls = calls
                    .into_iter()
                    .map(|(name, arguments)| ToolCall {
                        id: self.next_id("call"),
                        name,
                        arguments: arguments.to_string(),
                    })
                    .collect();
                (RunStatus::RequiresAction, calls, None)
            }
            Some(Step::CallToolsAs(calls)) => {
                let calls = calls
                    .into_iter()
                    .map(|(id, name, arguments)| ToolCall {
                        id,
                        name,
                        arguments: arguments.to_string(),
                    })
                    .collect();
                (RunStatus::RequiresAction, calls, None)
            }
            Some(Step::Fail(message)) => (RunStatus::Failed, Vec::new(), Some(message)),
            None => (RunStatus::Completed, Vec::new(), None),
        };
        let run = Run {
            id: run_id.to_string(),
            status,
            pending_tool_calls: calls,
            last_error,
        };
        if let Some(slot) = self.runs.iter_mut().find(|r| r.id == run_id) {
            *slot = run.clone();
        } else {
            self.runs.push(run.clone());
        }
        (run, reply)
    }
}

/// A model transport that plays back a fixed list of [`Step`]s.
///
/// Every run start or tool-output submission consumes one step. Once the
/// script is exhausted runs complete silently.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(Script {
                steps: steps.into_iter().collect(),
                ..Script::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_step(&self, step: Step) {
        self.lock().steps.push_back(step);
    }

    /// Make the next `count` message posts fail as if a run were still active.
    pub fn reject_messages(&self, count: u32) {
        self.lock().reject_messages = count;
    }

    pub fn run_requests(&self) -> Vec<RunRequest> {
        self.lock().run_requests.clone()
    }

    pub fn submissions(&self) -> Vec<Vec<ToolOutput>> {
        self.lock().submissions.clone()
    }

    pub fn cancelled_runs(&self) -> Vec<String> {
        self.lock().cancelled.clone()
    }

    pub fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.lock()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    fn start(&self, conversation_id: &str, request: &RunRequest) -> (Run, Option<Message>) {
        let mut script = self.lock();
        script.run_requests.push(request.clone());
        let run_id = script.next_id("run");
        script.advance(conversation_id, &run_id)
    }

    fn resume(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<(Run, Option<Message>), TransportError> {
        let mut script = self.lock();
        let waiting = script
            .runs
            .iter()
            .any(|r| r.id == run_id && r.status == RunStatus::RequiresAction);
        if !waiting {
            return Err(TransportError::Api {
                status: 400,
                message: format!("run {run_id} is not waiting on tool outputs"),
            });
        }
        script.submissions.push(outputs.to_vec());
        Ok(script.advance(conversation_id, run_id))
    }
}

/// The event sequence a streamed run would produce for a settled step.
fn events_for(run: Run, reply: Option<Message>) -> RunEventStream {
    let mut events = vec![RunEvent::Status(Run {
        status: RunStatus::InProgress,
        pending_tool_calls: Vec::new(),
        last_error: None,
        ..run.clone()
    })];
    if let Some(message) = reply {
        events.push(RunEvent::TextDelta {
            message_id: message.id.clone(),
            text: message.content.clone(),
        });
        events.push(RunEvent::MessageCompleted(message));
    }
    events.push(RunEvent::Status(run));
    Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn create_conversation(&self) -> Result<String, TransportError> {
        let mut script = self.lock();
        let id = script.next_id("conv");
        script.messages.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn create_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> Result<Message, TransportError> {
        let mut script = self.lock();
        if script.reject_messages > 0 {
            script.reject_messages -= 1;
            return Err(TransportError::RunActive {
                conversation_id: conversation_id.to_string(),
            });
        }
        Ok(script.push_message(conversation_id, message.role, message.content.clone()))
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Message>, TransportError> {
        let mut messages = self.messages(conversation_id);
        if options.newest_first {
            messages.reverse();
        }
        messages.truncate(options.limit as usize);
        Ok(messages)
    }

    async fn list_runs(
        &self,
        _conversation_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Run>, TransportError> {
        let mut runs = self.lock().runs.clone();
        if options.newest_first {
            runs.reverse();
        }
        runs.truncate(options.limit as usize);
        Ok(runs)
    }

    async fn cancel_run(&self, _conversation_id: &str, run_id: &str) -> Result<Run, TransportError> {
        let mut script = self.lock();
        script.cancelled.push(run_id.to_string());
        let run = script
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: format!("no run {run_id}"),
            })?;
        run.status = RunStatus::Cancelled;
        run.pending_tool_calls.clear();
        Ok(run.clone())
    }

    async fn create_run_and_poll(
        &self,
        conversation_id: &str,
        request: &RunRequest,
    ) -> Result<Run, TransportError> {
        Ok(self.start(conversation_id, request).0)
    }

    async fn stream_run(
        &self,
        conversation_id: &str,
        request: &RunRequest,
    ) -> Result<RunEventStream, TransportError> {
        let (run, reply) = self.start(conversation_id, request);
        Ok(events_for(run, reply))
    }

    async fn submit_tool_outputs_and_poll(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, TransportError> {
        Ok(self.resume(conversation_id, run_id, outputs)?.0)
    }

    async fn submit_tool_outputs_stream(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunEventStream, TransportError> {
        let (run, reply) = self.resume(conversation_id, run_id, outputs)?;
        Ok(events_for(run, reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn request() -> RunRequest {
        RunRequest {
            model: "test".to_string(),
            instructions: String::new(),
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn tool_steps_wait_for_outputs() {
        let transport = ScriptedTransport::new([
            Step::call("Validate-Spec", json!({})),
            Step::reply("All good."),
        ]);
        let conv = transport.create_conversation().await.unwrap();

        let run = transport.create_run_and_poll(&conv, &request()).await.unwrap();
        assert_eq!(run.status, RunStatus::RequiresAction);
        assert_eq!(run.pending_tool_calls.len(), 1);

        let outputs = [ToolOutput {
            tool_call_id: run.pending_tool_calls[0].id.clone(),
            output: "ok".to_string(),
        }];
        let done = transport
            .submit_tool_outputs_and_poll(&conv, &run.id, &outputs)
            .await
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(transport.messages(&conv).last().unwrap().content, "All good.");

        let again = transport.submit_tool_outputs_and_poll(&conv, &run.id, &outputs).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn streamed_reply_ends_with_halted_status() {
        let transport = ScriptedTransport::new([Step::reply("Hello")]);
        let events: Vec<RunEvent> = transport
            .stream_run("conv", &request())
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[1], RunEvent::TextDelta { text, .. } if text == "Hello"));
        assert!(matches!(&events[3], RunEvent::Status(run) if run.status == RunStatus::Completed));
    }

    #[tokio::test]
    async fn failing_gateway_counts_nothing() {
        let gateway = RecordingGateway::failing();
        assert!(gateway.write(&Document::default()).await.is_err());
        assert_eq!(gateway.write_count(), 0);
        gateway.set_failing(false);
        gateway.write(&Document::default()).await.unwrap();
        assert_eq!(gateway.write_count(), 1);
    }
}
