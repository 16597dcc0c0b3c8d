// ABOUTME: Factory for model transports.
// ABOUTME: Resolves a provider name and its settings into a configured Arc<dyn ModelTransport>.

use std::sync::Arc;
use std::time::Duration;

use crate::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiSettings, OpenAiTransport};
use crate::transport::ModelTransport;

/// Provider-neutral transport settings, usually filled from the environment.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub assistant_id: Option<String>,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            base_url: None,
            assistant_id: None,
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Create a transport for `settings.provider`.
pub fn create_transport(settings: &ModelSettings) -> Result<Arc<dyn ModelTransport>, anyhow::Error> {
    match settings.provider.as_str() {
        "openai" => {
            let api_key = settings
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
            let transport = OpenAiTransport::new(OpenAiSettings {
                base_url: settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                assistant_id: settings.assistant_id.clone(),
                model: settings.model.clone(),
                request_timeout: settings.request_timeout,
                ..OpenAiSettings::new(api_key)
            })?;
            Ok(Arc::new(transport))
        }
        unknown => Err(anyhow::anyhow!("unsupported model provider: {}", unknown)),
    }
}
