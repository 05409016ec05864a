//! OpenAI-compatible chat completions (Groq and OpenAI).
//!
//! POST `{base_url}/chat/completions` with bearer auth. The reply text is at
//! `choices[0].message.content`.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tracing::debug;

use super::{check_status, CompletionBackend, ProviderError, ProviderKind, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::config::ProviderSettings;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_MODEL: &str = "llama-3.3-70b-versatile";

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-4-turbo-preview";

pub struct OpenAiCompatBackend {
    kind: ProviderKind,
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    pub fn groq(settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self::with_defaults(ProviderKind::Groq, settings, GROQ_BASE_URL, GROQ_MODEL, client)
    }

    pub fn openai(settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self::with_defaults(ProviderKind::OpenAi, settings, OPENAI_BASE_URL, OPENAI_MODEL, client)
    }

    fn with_defaults(
        kind: ProviderKind,
        settings: &ProviderSettings,
        base_url: &str,
        model: &str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            kind,
            api_key: settings.api_key.clone(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| base_url.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: settings.model.clone().unwrap_or_else(|| model.to_string()),
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, system: &str, user: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_OUTPUT_TOKENS,
        })
    }
}

impl CompletionBackend for OpenAiCompatBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
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
                .ok_or(ProviderError::MissingKey(self.kind))?;

            debug!(provider = %self.kind, model = %self.model, "Chat completion request");

            let resp = self
                .client
                .post(self.endpoint())
                .bearer_auth(key)
                .json(&self.request_body(system, user))
                .send()
                .await?;
            let resp = check_status(resp).await?;

            let json: Value = resp
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            parse_chat_completion(&json)
        })
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
pub fn parse_chat_completion(json: &Value) -> Result<String, ProviderError> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::MalformedResponse("missing choices[0].message.content".into()))
}
