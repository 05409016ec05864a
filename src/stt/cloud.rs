//! Cloud Whisper-compatible transcription (Groq, OpenAI).
//!
//! Both speak the OpenAI `audio/transcriptions` protocol: a multipart form
//! with `model` and `file`, answered by `{"text": "..."}`.

use std::path::Path;

use reqwest::multipart;
use tracing::debug;

use super::SttEngine;

pub const GROQ_TRANSCRIBE_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
pub const GROQ_STT_MODEL: &str = "whisper-large-v3-turbo";

pub const OPENAI_TRANSCRIBE_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const OPENAI_STT_MODEL: &str = "whisper-1";

pub struct CloudStt {
    label: &'static str,
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl CloudStt {
    pub fn groq(api_key: &str, endpoint: Option<&str>, model: Option<&str>) -> Self {
        Self::new("groq", api_key, endpoint.unwrap_or(GROQ_TRANSCRIBE_URL), model.unwrap_or(GROQ_STT_MODEL))
    }

    pub fn openai(api_key: &str, endpoint: Option<&str>, model: Option<&str>) -> Self {
        Self::new(
            "openai",
            api_key,
            endpoint.unwrap_or(OPENAI_TRANSCRIBE_URL),
            model.unwrap_or(OPENAI_STT_MODEL),
        )
    }

    fn new(label: &'static str, api_key: &str, endpoint: &str, model: &str) -> Self {
        Self {
            label,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn name(&self) -> String {
        format!("{} ({})", self.label, self.model)
    }
}

impl SttEngine for CloudStt {
    async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", audio_path.display(), e))?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        debug!(
            bytes = bytes.len(),
            endpoint = %self.endpoint,
            "Sending audio to {} transcription API",
            self.label
        );

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(audio_path))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", file_part);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} STT API error {}: {}", self.label, status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json["text"].as_str().unwrap_or("").trim().to_string();

        Ok(text)
    }
}

/// Content type for an uploaded audio file, by extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
