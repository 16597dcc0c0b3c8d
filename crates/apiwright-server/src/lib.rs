// ABOUTME: HTTP server for apiwright: conversation management, streamed assistant turns, and document previews.
// ABOUTME: Uses Axum with shared per-conversation sessions and environment-driven configuration.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ApiwrightConfig, ConfigError};
pub use routes::create_router;
