// ABOUTME: Agent layer for apiwright: tool catalogue, tool invoker, run orchestrator, and model transports.
// ABOUTME: Drives a hosted assistant's tool-calling runs against one conversation's OpenAPI document.

pub mod client;
pub mod context;
pub mod hooks;
pub mod invoker;
pub mod openai;
pub mod orchestrator;
pub mod session;
pub mod spec_tools;
pub mod sse;
pub mod testing;
pub mod tool;
pub mod transport;

pub use client::{ModelSettings, create_transport};
pub use context::DocumentInstructions;
pub use hooks::SaveOnCompletion;
pub use invoker::ToolInvoker;
pub use orchestrator::{
    AfterRun, AfterRunHook, InstructionsProvider, MAX_CORRECTION_ATTEMPTS, OrchestratorError,
    RunOrchestrator, TurnEvent, TurnOutcome,
};
pub use session::Session;
pub use spec_tools::build_registry;
pub use tool::{Tool, ToolError, ToolId, ToolRegistry, ToolResult};
pub use transport::{
    ListOptions, Message, ModelTransport, NewMessage, Role, Run, RunStatus, TransportError,
};
