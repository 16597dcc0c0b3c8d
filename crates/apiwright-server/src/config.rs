// ABOUTME: Configuration loading and validation for the apiwright server and CLI.
// ABOUTME: Reads environment variables, builds storage/model/validation settings, and enforces auth on remote binds.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use apiwright_agent::ModelSettings;
use apiwright_agent::openai::DEFAULT_MODEL;
use apiwright_core::validation::DEFAULT_BLOCKING_SEVERITY;
use apiwright_core::{DiagnosticProducer, StructuralRules, ValidationGate};
use apiwright_store::{ExternalLinter, StorageKind, StorageSettings};
use thiserror::Error;

use crate::app_state::DEFAULT_MAX_CONVERSATIONS;

pub const DEFAULT_BIND: &str = "127.0.0.1:7341";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APIWRIGHT_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("remote access is enabled but APIWRIGHT_AUTH_TOKEN is not set; refusing to start without authentication")]
    RemoteWithoutToken,

    #[error("STORAGE_ADAPTER_TYPE: {0}")]
    InvalidStorage(String),

    #[error("APIWRIGHT_BLOCKING_SEVERITY must be 0-3, got {0}")]
    InvalidSeverity(String),

    #[error("APIWRIGHT_MAX_CONVERSATIONS must be a positive integer, got {0}")]
    InvalidMaxConversations(String),
}

/// Everything the binary needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ApiwrightConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub allow_remote: bool,
    pub auth_token: Option<String>,
    pub storage: StorageSettings,
    /// Server URL shown in previews instead of the document's own servers.
    pub api_base_url: String,
    pub model: ModelSettings,
    pub blocking_severity: u8,
    /// Linter command line; the built-in rules are used when unset.
    pub lint_command: Option<String>,
    /// Conversations the server keeps loaded before evicting idle ones.
    pub max_conversations: usize,
}

fn flag(value: Option<String>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

impl ApiwrightConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - APIWRIGHT_HOME: data directory (default: ~/.apiwright)
    /// - APIWRIGHT_BIND: socket address to bind (default: 127.0.0.1:7341)
    /// - APIWRIGHT_ALLOW_REMOTE: allow non-loopback connections (default: false)
    /// - APIWRIGHT_AUTH_TOKEN: bearer token for /api routes (optional)
    /// - STORAGE_ADAPTER_TYPE: file|local|sqlite|kv (default: file)
    /// - APIWRIGHT_OPENAPI_PATH: document path for the file backend (default: ./openapi.json)
    /// - API_BASE_URL: preview server URL (default: http://localhost:3001)
    /// - OPENAI_API_KEY, OPENAI_BASE_URL, OPENAI_ASSISTANT_ID, APIWRIGHT_MODEL
    /// - APIWRIGHT_BLOCKING_SEVERITY: highest severity that blocks a save (default: 0)
    /// - APIWRIGHT_LINT_COMMAND: external linter command line (optional)
    /// - APIWRIGHT_MAX_CONVERSATIONS: loaded conversations before idle ones are evicted (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = var("APIWRIGHT_HOME").map(PathBuf::from).unwrap_or_else(|| {
            var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".apiwright")
        });

        let bind_str = var("APIWRIGHT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let allow_remote = flag(var("APIWRIGHT_ALLOW_REMOTE"));
        let auth_token = var("APIWRIGHT_AUTH_TOKEN");
        if (allow_remote || !bind.ip().is_loopback()) && auth_token.is_none() {
            return Err(ConfigError::RemoteWithoutToken);
        }

        let kind = match var("STORAGE_ADAPTER_TYPE") {
            Some(raw) => raw
                .parse::<StorageKind>()
                .map_err(|e| ConfigError::InvalidStorage(e.to_string()))?,
            None => StorageKind::default(),
        };
        let storage = StorageSettings {
            kind,
            openapi_path: var("APIWRIGHT_OPENAPI_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("openapi.json")),
            database_path: home.join("documents.db"),
        };

        let blocking_severity = match var("APIWRIGHT_BLOCKING_SEVERITY") {
            Some(raw) => match raw.trim().parse::<u8>() {
                Ok(level) if level <= 3 => level,
                _ => return Err(ConfigError::InvalidSeverity(raw)),
            },
            None => DEFAULT_BLOCKING_SEVERITY,
        };

        let max_conversations = match var("APIWRIGHT_MAX_CONVERSATIONS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(max) if max > 0 => max,
                _ => return Err(ConfigError::InvalidMaxConversations(raw)),
            },
            None => DEFAULT_MAX_CONVERSATIONS,
        };

        let model = ModelSettings {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("OPENAI_BASE_URL"),
            assistant_id: var("OPENAI_ASSISTANT_ID"),
            model: var("APIWRIGHT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ..ModelSettings::default()
        };

        Ok(Self {
            home,
            bind,
            allow_remote,
            auth_token,
            storage,
            api_base_url: var("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            model,
            blocking_severity,
            lint_command: var("APIWRIGHT_LINT_COMMAND"),
            max_conversations,
        })
    }

    /// Replace the bind address, re-checking that a non-loopback bind has a token.
    pub fn with_bind(mut self, bind: SocketAddr) -> Result<Self, ConfigError> {
        if !bind.ip().is_loopback() && self.auth_token.is_none() {
            return Err(ConfigError::RemoteWithoutToken);
        }
        self.bind = bind;
        Ok(self)
    }

    /// The validation gate: the external linter when configured, else the built-in rules.
    pub fn validation_gate(&self) -> ValidationGate {
        let producer: Arc<dyn DiagnosticProducer> = match self
            .lint_command
            .as_deref()
            .and_then(ExternalLinter::from_command_line)
        {
            Some(linter) => Arc::new(linter),
            None => Arc::new(StructuralRules),
        };
        ValidationGate::new(producer).with_blocking_severity(self.blocking_severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiwrightConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiwrightConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn config_loads_defaults() {
        let config = load(&[("HOME", "/home/ada")]).unwrap();

        assert_eq!(config.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert!(!config.allow_remote);
        assert!(config.auth_token.is_none());
        assert_eq!(config.home, PathBuf::from("/home/ada/.apiwright"));
        assert_eq!(config.storage.kind, StorageKind::File);
        assert_eq!(config.storage.openapi_path, PathBuf::from("openapi.json"));
        assert_eq!(config.storage.database_path, PathBuf::from("/home/ada/.apiwright/documents.db"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.model.model, "gpt-4o");
        assert!(config.model.api_key.is_none());
        assert_eq!(config.blocking_severity, 0);
        assert_eq!(config.validation_gate().producer_name(), "structural-rules");
        assert_eq!(config.max_conversations, DEFAULT_MAX_CONVERSATIONS);
    }

    #[test]
    fn config_rejects_remote_without_token() {
        let err = load(&[("APIWRIGHT_ALLOW_REMOTE", "true")]).unwrap_err();
        assert!(err.to_string().contains("APIWRIGHT_AUTH_TOKEN"), "got: {err}");

        let err = load(&[("APIWRIGHT_BIND", "0.0.0.0:7341")]).unwrap_err();
        assert!(matches!(err, ConfigError::RemoteWithoutToken));

        let config = load(&[
            ("APIWRIGHT_BIND", "0.0.0.0:7341"),
            ("APIWRIGHT_AUTH_TOKEN", "s3cret"),
        ])
        .unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn storage_and_model_overrides() {
        let config = load(&[
            ("APIWRIGHT_HOME", "/srv/apiwright"),
            ("STORAGE_ADAPTER_TYPE", "kv"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_ASSISTANT_ID", "asst_123"),
            ("APIWRIGHT_MODEL", "gpt-4o-mini"),
            ("APIWRIGHT_BLOCKING_SEVERITY", "1"),
            ("APIWRIGHT_LINT_COMMAND", "spectral lint -f json"),
            ("APIWRIGHT_MAX_CONVERSATIONS", "16"),
        ])
        .unwrap();

        assert_eq!(config.max_conversations, 16);

        assert_eq!(config.storage.kind, StorageKind::Sqlite);
        assert_eq!(config.storage.database_path, PathBuf::from("/srv/apiwright/documents.db"));
        assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.assistant_id.as_deref(), Some("asst_123"));
        assert_eq!(config.model.model, "gpt-4o-mini");
        let gate = config.validation_gate();
        assert_eq!(gate.blocking_severity(), 1);
        assert_eq!(gate.producer_name(), "spectral");
    }

    #[test]
    fn bind_override_keeps_the_token_rule() {
        let config = load(&[]).unwrap();
        assert!(config.clone().with_bind("0.0.0.0:8080".parse().unwrap()).is_err());
        let moved = config.with_bind("127.0.0.1:8080".parse().unwrap()).unwrap();
        assert_eq!(moved.bind.port(), 8080);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("APIWRIGHT_BIND", "not-an-address")]),
            Err(ConfigError::InvalidBind(_))
        ));
        assert!(matches!(
            load(&[("STORAGE_ADAPTER_TYPE", "s3")]),
            Err(ConfigError::InvalidStorage(_))
        ));
        assert!(matches!(
            load(&[("APIWRIGHT_BLOCKING_SEVERITY", "7")]),
            Err(ConfigError::InvalidSeverity(_))
        ));
        assert!(matches!(
            load(&[("APIWRIGHT_MAX_CONVERSATIONS", "0")]),
            Err(ConfigError::InvalidMaxConversations(_))
        ));
    }
}
