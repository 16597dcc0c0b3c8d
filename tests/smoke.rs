// ABOUTME: End-to-end smoke test for the full apiwright lifecycle over the HTTP router.
// ABOUTME: Covers conversation creation, a tool-calling turn, the saved file on disk, and the document preview.

use std::sync::Arc;

use apiwright_agent::testing::{ScriptedTransport, Step};
use apiwright_core::{StructuralRules, ValidationGate};
use apiwright_server::{AppState, create_router};
use apiwright_store::{Storage, StorageKind, StorageSettings};
use axum::body::Body;
use http::Request;
use tower::ServiceExt;

/// Helper to extract JSON body from a response.
async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn text_body(resp: axum::response::Response) -> String {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn smoke_test_full_lifecycle() {
    // 1. File-backed storage in a temp dir
    let dir = tempfile::TempDir::new().unwrap();
    let openapi_path = dir.path().join("openapi.json");
    let storage = Storage::open(&StorageSettings {
        kind: StorageKind::File,
        openapi_path: openapi_path.clone(),
        database_path: dir.path().join("documents.db"),
    })
    .unwrap();

    // 2. A scripted model: add a schema, then reply
    let transport = Arc::new(ScriptedTransport::new([
        Step::call(
            "Set-Schema-Component",
            serde_json::json!({
                "name": "Pet",
                "schema": {
                    "type": "object",
                    "required": ["name"],
                    "properties": { "name": { "type": "string" } }
                }
            }),
        ),
        Step::reply("Added a Pet schema."),
    ]));
    let state = Arc::new(AppState::new(
        storage,
        transport.clone(),
        ValidationGate::new(Arc::new(StructuralRules)),
        "gpt-4o",
        "http://localhost:3001",
    ));

    // 3. POST /api/conversations
    let app = create_router(Arc::clone(&state));
    let resp = app
        .oneshot(Request::post("/api/conversations").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "create conversation should return 201");
    let json = json_body(resp).await;
    let conversation_id = json["conversation_id"].as_str().unwrap().to_string();

    // 4. POST /api/assistant -> streamed turn
    let app = create_router(Arc::clone(&state));
    let body = serde_json::json!({
        "conversation_id": conversation_id,
        "message": "Model a pet store"
    });
    let resp = app
        .oneshot(
            Request::post("/api/assistant")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "assistant turn should return 200");
    let stream = text_body(resp).await;
    assert!(stream.contains("event: tool_call_started"));
    assert!(stream.contains("event: tool_call_finished"));
    assert!(stream.contains("Added a Pet schema."));
    assert!(stream.contains("\"status\":\"completed\""));
    assert_eq!(transport.submissions().len(), 1, "one tool output batch");

    // 5. The document was saved to disk
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&openapi_path).unwrap()).unwrap();
    assert_eq!(saved["openapi"], "3.1.0");
    assert_eq!(
        saved["components"]["schemas"]["Pet"]["required"][0],
        "name"
    );

    // 6. GET /api/specs/{id} -> preview with the configured server
    let app = create_router(Arc::clone(&state));
    let resp = app
        .oneshot(
            Request::get(format!("/api/specs/{conversation_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "get spec should return 200");
    let view = json_body(resp).await;
    assert!(view["document"]["components"]["schemas"]["Pet"].is_object());
    assert_eq!(view["document"]["servers"][0]["url"], "http://localhost:3001");
    assert!(view["revision"].as_u64().unwrap() >= 1);

    // 7. GET messages -> user message then assistant reply, oldest first
    let app = create_router(Arc::clone(&state));
    let resp = app
        .oneshot(
            Request::get(format!("/api/conversations/{conversation_id}/messages"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let messages = json_body(resp).await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.first().unwrap()["content"], "Model a pet store");
    assert_eq!(messages.last().unwrap()["content"], "Added a Pet schema.");

    // 8. The preview server was never persisted
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&openapi_path).unwrap()).unwrap();
    assert_ne!(saved["servers"][0]["url"], "http://localhost:3001");
}
