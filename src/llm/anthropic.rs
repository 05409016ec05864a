//! Anthropic Messages API.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tracing::debug;

use super::{check_status, CompletionBackend, ProviderError, ProviderKind, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::config::ProviderSettings;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            base_url: settings
                .base_url
                .as_deref()
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| ANTHROPIC_MODEL.to_string()),
            client,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/messages", self.base_url)
    }

    /// The system prompt travels in the top-level `system` field.
    fn request_body(&self, system: &str, user: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": TEMPERATURE,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        })
    }
}

impl CompletionBackend for AnthropicBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn has_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            let key = self
                .api_key
                .as_deref()
                .ok_or(ProviderError::MissingKey(ProviderKind::Anthropic))?;

            debug!(model = %self.model, "Anthropic messages request");

            let resp = self
                .client
                .post(self.endpoint())
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&self.request_body(system, user))
                .send()
                .await?;
            let resp = check_status(resp).await?;

            let json: Value = resp
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            parse_message(&json)
        })
    }
}

/// Pull `content[0].text` out of a Messages API body.
pub fn parse_message(json: &Value) -> Result<String, ProviderError> {
    json.pointer("/content/0/text")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::MalformedResponse("missing content[0].text".into()))
}
