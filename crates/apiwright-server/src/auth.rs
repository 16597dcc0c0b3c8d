// ABOUTME: Bearer token authentication layer for the apiwright API.
// ABOUTME: Guards /api and /api/* with a shared token; health checks stay open.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, StatusCode, header};
use axum::response::IntoResponse;
use tower::{Layer, Service};

fn is_protected(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Applies bearer token checks to API routes.
#[derive(Clone)]
pub struct AuthLayer {
    token: Arc<str>,
}

impl AuthLayer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = RequireToken<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireToken {
            inner,
            token: Arc::clone(&self.token),
        }
    }
}

#[derive(Clone)]
pub struct RequireToken<S> {
    inner: S,
    token: Arc<str>,
}

impl<S> Service<Request<Body>> for RequireToken<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let allowed = !is_protected(req.uri().path())
            || bearer_token(req.headers()) == Some(self.token.as_ref());
        if !allowed {
            tracing::debug!(path = %req.uri().path(), "rejected request without a valid token");
            return Box::pin(async {
                Ok((
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "unauthorized" })),
                )
                    .into_response())
            });
        }
        // Swap in the clone that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api", get(|| async { "api root" }))
            .route("/api/specs/{id}", get(|| async { "spec" }))
            .route("/health", get(|| async { "ok" }))
            .layer(AuthLayer::new("token-123"))
    }

    async fn status(req: Request<Body>) -> StatusCode {
        test_router().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn rejects_missing_and_wrong_tokens() {
        assert_eq!(
            status(Request::get("/api/specs/c1").body(Body::empty()).unwrap()).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(
                Request::get("/api/specs/c1")
                    .header("authorization", "Bearer nope")
                    .body(Body::empty())
                    .unwrap()
            )
            .await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(Request::get("/api").body(Body::empty()).unwrap()).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let req = Request::get("/api/specs/c1")
            .header("authorization", "Bearer token-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_open() {
        assert_eq!(
            status(Request::get("/health").body(Body::empty()).unwrap()).await,
            StatusCode::OK
        );
    }

    #[test]
    fn only_bearer_scheme_counts() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        assert!(!is_protected("/apiary"));
    }
}
