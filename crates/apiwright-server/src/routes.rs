// ABOUTME: Route definitions for the apiwright HTTP API.
// ABOUTME: Assembles handlers, auth, tracing, and CORS layers into a single Axum Router.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::auth::AuthLayer;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    let auth_token = state.auth_token.clone();
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/conversations", post(api::conversations::create_conversation))
        .route("/api/conversations/{id}/messages", get(api::conversations::list_messages))
        .route("/api/assistant", post(api::assistant::send_message))
        .route("/api/specs/{id}", get(api::specs::get_spec))
        .with_state(state);

    let router = match auth_token {
        Some(token) => router.layer(AuthLayer::new(token)),
        None => router,
    };
    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use apiwright_agent::testing::{ScriptedTransport, Step};
    use apiwright_core::{StructuralRules, ValidationGate};
    use apiwright_store::{Storage, StorageKind, StorageSettings};
    use axum::body::Body;
    use http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(dir: &TempDir, transport: Arc<ScriptedTransport>) -> AppState {
        let storage = Storage::open(&StorageSettings {
            kind: StorageKind::Sqlite,
            openapi_path: dir.path().join("openapi.json"),
            database_path: dir.path().join("documents.db"),
        })
        .unwrap();
        AppState::new(
            storage,
            transport,
            ValidationGate::new(Arc::new(StructuralRules)),
            "gpt-4o",
            "http://localhost:3001",
        )
    }

    async fn body_text(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let dir = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&dir, Arc::new(ScriptedTransport::default()))));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn conversation_lifecycle() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new([Step::reply("Hi! What are we building?")]));
        let app = create_router(Arc::new(test_state(&dir, transport)));

        let resp = app
            .clone()
            .oneshot(Request::post("/api/conversations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        let id = created["conversation_id"].as_str().unwrap().to_string();

        let resp = app
            .clone()
            .oneshot(json_post(
                "/api/assistant",
                json!({ "conversation_id": id, "message": "Hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let stream = body_text(resp).await;
        assert!(stream.contains("event: run_started"));
        assert!(stream.contains("event: finished"));
        assert!(stream.contains("\"status\":\"completed\""));

        let resp = app
            .oneshot(
                Request::get(format!("/api/conversations/{id}/messages"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let messages: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[tokio::test]
    async fn spec_preview_uses_base_url() {
        let dir = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&dir, Arc::new(ScriptedTransport::default()))));

        let resp = app
            .oneshot(Request::get("/api/specs/conv_1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let view: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(view["document"]["openapi"], "3.1.0");
        assert_eq!(view["document"]["servers"][0]["url"], "http://localhost:3001");
        assert_eq!(view["diagnostics"][0]["code"], "info-description");
    }

    #[tokio::test]
    async fn bad_requests_are_rejected() {
        let dir = TempDir::new().unwrap();
        let app = create_router(Arc::new(test_state(&dir, Arc::new(ScriptedTransport::default()))));

        let resp = app
            .clone()
            .oneshot(json_post(
                "/api/assistant",
                json!({ "conversation_id": "conv_1", "message": "   " }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(Request::get("/api/specs/bad%20id").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn token_guards_api_routes() {
        let dir = TempDir::new().unwrap();
        let mut state = test_state(&dir, Arc::new(ScriptedTransport::default()));
        state.auth_token = Some("s3cret".to_string());
        let app = create_router(Arc::new(state));

        let resp = app
            .clone()
            .oneshot(Request::get("/api/specs/conv_1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(
                Request::get("/api/specs/conv_1")
                    .header("authorization", "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
