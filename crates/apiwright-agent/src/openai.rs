// ABOUTME: ModelTransport over the OpenAI Assistants v2 HTTP API (threads, messages, runs).
// ABOUTME: Polls runs to a halt or streams them as server-sent events through SseParser.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::{OnceCell, mpsc};
use tokio_stream::wrappers::ReceiverStream;

use crate::sse::{SseFrame, SseParser};
use crate::transport::{
    ListOptions, Message, ModelTransport, NewMessage, Role, Run, RunEvent, RunEventStream,
    RunRequest, RunStatus, ToolCall, ToolDefinition, ToolOutput, TransportError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Name the assistant is looked up and created under.
pub const ASSISTANT_NAME: &str = "apiwright";

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const STREAM_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub assistant_id: Option<String>,
    pub model: String,
    /// Bound on each non-streaming request, body included.
    pub request_timeout: Duration,
    /// How long a polled run may stay in progress, and how long one streamed
    /// run segment may take end to end.
    pub run_timeout: Duration,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            assistant_id: None,
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(600),
        }
    }
}

pub struct OpenAiTransport {
    http: reqwest::Client,
    settings: OpenAiSettings,
    assistant_id: OnceCell<String>,
}

// Wire shapes

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AssistantObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    id: String,
    role: Role,
    #[serde(default)]
    content: Vec<ContentPart>,
    #[serde(default)]
    created_at: i64,
}

impl From<MessageObject> for Message {
    fn from(wire: MessageObject) -> Self {
        let content = wire
            .content
            .into_iter()
            .filter_map(|part| part.text.map(|t| t.value))
            .collect::<Vec<_>>()
            .join("\n");
        Message {
            id: wire.id,
            role: wire.role,
            content,
            created_at: wire.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    id: String,
    delta: DeltaBody,
}

#[derive(Debug, Deserialize)]
struct DeltaBody {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Debug, Deserialize)]
struct LastError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<RequiredAction>,
    #[serde(default)]
    last_error: Option<LastError>,
}

impl From<RunObject> for Run {
    fn from(wire: RunObject) -> Self {
        let pending_tool_calls = wire
            .required_action
            .map(|action| {
                action
                    .submit_tool_outputs
                    .tool_calls
                    .into_iter()
                    .map(|call| ToolCall {
                        id: call.id,
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Run {
            id: wire.id,
            status: wire.status,
            pending_tool_calls,
            last_error: wire.last_error.map(|e| e.message),
        }
    }
}

fn http_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Http(e.to_string())
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// The API refuses new messages on a thread with an active run with this wording.
fn is_run_active(message: &str) -> bool {
    message.contains("Can't add messages to thread_") || message.contains("while a run")
}

fn function_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}

fn outputs_body(outputs: &[ToolOutput], stream: bool) -> Value {
    let tool_outputs: Vec<Value> = outputs
        .iter()
        .map(|o| json!({ "tool_call_id": o.tool_call_id, "output": o.output }))
        .collect();
    json!({ "tool_outputs": tool_outputs, "stream": stream })
}

fn parse<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, TransportError> {
    serde_json::from_str(data)
        .map_err(|e| TransportError::InvalidResponse(format!("{event} payload: {e}")))
}

/// Map one assistant stream frame to a run event. Frames we do not track yield `None`.
fn frame_event(frame: &SseFrame) -> Result<Option<RunEvent>, TransportError> {
    let Some(event) = frame.event.as_deref() else {
        return Ok(None);
    };
    match event {
        "thread.message.delta" => {
            let delta: MessageDelta = parse(event, &frame.data)?;
            let text: String = delta
                .delta
                .content
                .into_iter()
                .filter_map(|part| part.text.map(|t| t.value))
                .collect();
            if text.is_empty() {
                return Ok(None);
            }
            Ok(Some(RunEvent::TextDelta {
                message_id: delta.id,
                text,
            }))
        }
        "thread.message.completed" => {
            let message: MessageObject = parse(event, &frame.data)?;
            Ok(Some(RunEvent::MessageCompleted(message.into())))
        }
        e if e.starts_with("thread.run.") && !e.starts_with("thread.run.step") => {
            let run: RunObject = parse(event, &frame.data)?;
            Ok(Some(RunEvent::Status(run.into())))
        }
        "error" => Err(TransportError::Api {
            status: 500,
            message: error_message(&frame.data),
        }),
        _ => Ok(None),
    }
}

async fn forward(
    frames: Vec<SseFrame>,
    sender: &mpsc::Sender<Result<RunEvent, TransportError>>,
) -> bool {
    for frame in &frames {
        let item = match frame_event(frame) {
            Ok(Some(event)) => Ok(event),
            Ok(None) => continue,
            Err(e) => Err(e),
        };
        let stop = item.is_err();
        if sender.send(item).await.is_err() || stop {
            return false;
        }
    }
    true
}

impl OpenAiTransport {
    pub fn new(settings: OpenAiSettings) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let assistant_id = match &settings.assistant_id {
            Some(id) => OnceCell::new_with(Some(id.clone())),
            None => OnceCell::new(),
        };
        Ok(Self {
            http,
            settings,
            assistant_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    fn base_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.settings.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.base_request(method, path)
            .timeout(self.settings.request_timeout)
    }

    /// A POST whose body is a run event stream, bounded by the run timeout.
    fn stream_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.base_request(reqwest::Method::POST, path)
            .timeout(self.settings.run_timeout)
    }

    async fn send_raw(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let response = builder.send().await.map_err(http_error)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("unable to read error body: {e}"),
        };
        Err(TransportError::Api {
            status,
            message: error_message(&body),
        })
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, TransportError> {
        self.send_raw(builder)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }

    /// The configured assistant, or the one named [`ASSISTANT_NAME`], created on first use.
    pub async fn assistant_id(&self) -> Result<&str, TransportError> {
        self.assistant_id
            .get_or_try_init(|| self.find_or_create_assistant())
            .await
            .map(String::as_str)
    }

    async fn find_or_create_assistant(&self) -> Result<String, TransportError> {
        let page: Page<AssistantObject> = self
            .send(
                self.request(reqwest::Method::GET, "assistants")
                    .query(&[("limit", "100"), ("order", "desc")]),
            )
            .await?;
        if let Some(found) = page
            .data
            .into_iter()
            .find(|a| a.name.as_deref() == Some(ASSISTANT_NAME))
        {
            tracing::info!(assistant_id = %found.id, "using existing assistant");
            return Ok(found.id);
        }
        let created: ObjectId = self
            .send(self.request(reqwest::Method::POST, "assistants").json(&json!({
                "name": ASSISTANT_NAME,
                "model": self.settings.model,
            })))
            .await?;
        tracing::info!(assistant_id = %created.id, "created assistant");
        Ok(created.id)
    }

    async fn run_body(&self, request: &RunRequest, stream: bool) -> Result<Value, TransportError> {
        Ok(json!({
            "assistant_id": self.assistant_id().await?,
            "model": request.model,
            "instructions": request.instructions,
            "tools": function_tools(&request.tools),
            "stream": stream,
        }))
    }

    /// Poll `run_id` until it halts or the run timeout passes.
    async fn poll(&self, conversation_id: &str, run_id: &str) -> Result<Run, TransportError> {
        let started = Instant::now();
        loop {
            let run: RunObject = self
                .send(self.request(
                    reqwest::Method::GET,
                    &format!("threads/{conversation_id}/runs/{run_id}"),
                ))
                .await?;
            let run: Run = run.into();
            if run.status.is_halted() {
                tracing::debug!(run_id = %run.id, status = ?run.status, "run halted");
                return Ok(run);
            }
            if started.elapsed() > self.settings.run_timeout {
                return Err(TransportError::Timeout(run.id));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn stream(&self, builder: reqwest::RequestBuilder) -> Result<RunEventStream, TransportError> {
        let mut http_response = self.send_raw(builder).await?;
        let (sender, receiver) = mpsc::channel(STREAM_BUFFER_SIZE);
        tokio::spawn(async move {
            let mut parser = SseParser::default();
            loop {
                let chunk = match http_response.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => {
                        let _ = sender.send(Err(http_error(e))).await;
                        return;
                    }
                };
                match parser.push(&chunk) {
                    Ok(frames) => {
                        if !forward(frames, &sender).await {
                            return;
                        }
                    }
                    Err(message) => {
                        let _ = sender.send(Err(TransportError::InvalidResponse(message))).await;
                        return;
                    }
                }
            }
            match parser.finish() {
                Ok(frames) => {
                    forward(frames, &sender).await;
                }
                Err(message) => {
                    let _ = sender.send(Err(TransportError::InvalidResponse(message))).await;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(receiver)))
    }
}

#[async_trait]
impl ModelTransport for OpenAiTransport {
    async fn create_conversation(&self) -> Result<String, TransportError> {
        let thread: ObjectId = self
            .send(self.request(reqwest::Method::POST, "threads").json(&json!({})))
            .await?;
        tracing::info!(conversation_id = %thread.id, "created thread");
        Ok(thread.id)
    }

    async fn create_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> Result<Message, TransportError> {
        let builder = self
            .request(reqwest::Method::POST, &format!("threads/{conversation_id}/messages"))
            .json(&json!({ "role": message.role, "content": message.content }));
        match self.send::<MessageObject>(builder).await {
            Ok(wire) => Ok(wire.into()),
            Err(TransportError::Api { status: 400, message }) if is_run_active(&message) => {
                Err(TransportError::RunActive {
                    conversation_id: conversation_id.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Message>, TransportError> {
        let order = if options.newest_first { "desc" } else { "asc" };
        let page: Page<MessageObject> = self
            .send(
                self.request(reqwest::Method::GET, &format!("threads/{conversation_id}/messages"))
                    .query(&[("limit", options.limit.to_string()), ("order", order.to_string())]),
            )
            .await?;
        Ok(page.data.into_iter().map(Message::from).collect())
    }

    async fn list_runs(
        &self,
        conversation_id: &str,
        options: ListOptions,
    ) -> Result<Vec<Run>, TransportError> {
        let order = if options.newest_first { "desc" } else { "asc" };
        let page: Page<RunObject> = self
            .send(
                self.request(reqwest::Method::GET, &format!("threads/{conversation_id}/runs"))
                    .query(&[("limit", options.limit.to_string()), ("order", order.to_string())]),
            )
            .await?;
        Ok(page.data.into_iter().map(Run::from).collect())
    }

    async fn cancel_run(&self, conversation_id: &str, run_id: &str) -> Result<Run, TransportError> {
        let run: RunObject = self
            .send(self.request(
                reqwest::Method::POST,
                &format!("threads/{conversation_id}/runs/{run_id}/cancel"),
            ))
            .await?;
        Ok(run.into())
    }

    async fn create_run_and_poll(
        &self,
        conversation_id: &str,
        request: &RunRequest,
    ) -> Result<Run, TransportError> {
        let body = self.run_body(request, false).await?;
        let run: ObjectId = self
            .send(
                self.request(reqwest::Method::POST, &format!("threads/{conversation_id}/runs"))
                    .json(&body),
            )
            .await?;
        self.poll(conversation_id, &run.id).await
    }

    async fn stream_run(
        &self,
        conversation_id: &str,
        request: &RunRequest,
    ) -> Result<RunEventStream, TransportError> {
        let body = self.run_body(request, true).await?;
        self.stream(
            self.stream_request(&format!("threads/{conversation_id}/runs"))
                .json(&body),
        )
        .await
    }

    async fn submit_tool_outputs_and_poll(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, TransportError> {
        let _: ObjectId = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("threads/{conversation_id}/runs/{run_id}/submit_tool_outputs"),
                )
                .json(&outputs_body(outputs, false)),
            )
            .await?;
        self.poll(conversation_id, run_id).await
    }

    async fn submit_tool_outputs_stream(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunEventStream, TransportError> {
        self.stream(
            self.stream_request(&format!(
                "threads/{conversation_id}/runs/{run_id}/submit_tool_outputs"
            ))
            .json(&outputs_body(outputs, true)),
        )
        .await
    }
}
