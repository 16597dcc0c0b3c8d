// ABOUTME: Assistant turn handler: posts the user's message and streams the turn as server-sent events.
// ABOUTME: Turns on one conversation are serialized by the conversation's turn lock.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use apiwright_agent::{TurnEvent, TurnOutcome};

use super::{ApiError, check_conversation_id};
use crate::app_state::{Conversation, SharedState};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub conversation_id: String,
    pub message: String,
}

/// SSE event name for a turn event.
fn event_name(event: &TurnEvent) -> &'static str {
    match event {
        TurnEvent::RunStarted { .. } => "run_started",
        TurnEvent::TextDelta { .. } => "text_delta",
        TurnEvent::MessageCompleted { .. } => "message_completed",
        TurnEvent::ToolCallStarted { .. } => "tool_call_started",
        TurnEvent::ToolCallFinished { .. } => "tool_call_finished",
        TurnEvent::CorrectionStarted { .. } => "correction_started",
        TurnEvent::Finished { .. } => "finished",
    }
}

fn event_stream(rx: mpsc::Receiver<TurnEvent>) -> impl Stream<Item = Result<SseEvent, axum::Error>> {
    ReceiverStream::new(rx).filter_map(|event| async move {
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok(SseEvent::default().event(event_name(&event)).data(data)))
    })
}

async fn run_turn(conversation: Arc<Conversation>, message: String, events: mpsc::Sender<TurnEvent>) {
    let _turn = conversation.turn.lock().await;
    let orchestrator = &conversation.session.orchestrator;

    if let Err(e) = orchestrator.add_message(&message).await {
        tracing::warn!(
            conversation_id = orchestrator.conversation_id(),
            error = %e,
            "could not post message"
        );
        let outcome = TurnOutcome::Failed {
            run_id: None,
            reason: e.to_string(),
        };
        let _ = events.send(TurnEvent::Finished { outcome }).await;
        return;
    }

    // The orchestrator reports its own failures as a Finished event
    let _ = orchestrator.run_streaming(events).await;
}

/// POST /api/assistant - Run one assistant turn and stream its progress.
pub async fn send_message(
    State(state): State<SharedState>,
    Json(req): Json<AssistantRequest>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, axum::Error>>>, ApiError> {
    let conversation_id = check_conversation_id(&req.conversation_id)?;
    if req.message.trim().is_empty() {
        return Err(ApiError::EmptyMessage);
    }
    let conversation = state.conversation(conversation_id).await?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(run_turn(conversation, req.message, tx));

    Ok(Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_serde_tags() {
        let events = [
            TurnEvent::RunStarted {
                run_id: "run_1".to_string(),
            },
            TurnEvent::CorrectionStarted {
                attempt: 1,
                reason: "bad ref".to_string(),
            },
            TurnEvent::Finished {
                outcome: TurnOutcome::Failed {
                    run_id: None,
                    reason: "x".to_string(),
                },
            },
        ];
        for event in &events {
            let value = serde_json::to_value(event).unwrap();
            assert_eq!(value["type"], event_name(event));
        }
    }
}
