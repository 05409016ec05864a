//! ElevenLabs TTS: paid cloud synthesis via REST API.
//!
//! POST `{base_url}/text-to-speech/{voice_id}` with the `xi-api-key` header.
//! The response body (mp3) is written straight to the output file.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use tracing::info;

use super::{Emotion, TtsEngine, TtsError};
use crate::config::ElevenLabsSettings;

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
pub const ELEVENLABS_MODEL: &str = "eleven_turbo_v2_5";

pub struct ElevenLabsTts {
    api_key: Option<String>,
    voice_id: String,
    base_url: String,
    model_id: String,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(settings: &ElevenLabsSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build ElevenLabs client: {}", e))?;

        Ok(Self {
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            voice_id: settings.voice_id.clone(),
            base_url: settings
                .base_url
                .as_deref()
                .unwrap_or(ELEVENLABS_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model_id: settings
                .model_id
                .clone()
                .unwrap_or_else(|| ELEVENLABS_MODEL.to_string()),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/text-to-speech/{}", self.base_url, self.voice_id)
    }

    fn request_body(&self, text: &str, emotion: Emotion) -> serde_json::Value {
        let settings = emotion.voice_settings();
        serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": settings.stability,
                "similarity_boost": settings.similarity_boost,
                "style": settings.style,
                "use_speaker_boost": true,
            }
        })
    }
}

impl TtsEngine for ElevenLabsTts {
    fn synthesize_to_file<'a>(
        &'a self,
        text: &'a str,
        emotion: Emotion,
        out: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), TtsError>> + Send + 'a>> {
        Box::pin(async move {
            let key = self.api_key.as_deref().ok_or(TtsError::MissingKey)?;

            info!(voice = %self.voice_id, emotion = %emotion, text_len = text.len(), "ElevenLabs TTS request");

            let resp = self
                .client
                .post(self.endpoint())
                .header("xi-api-key", key)
                .header("Accept", "audio/mpeg")
                .json(&self.request_body(text, emotion))
                .send()
                .await
                .map_err(|e| TtsError::NetworkError(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(TtsError::ApiError { status, body });
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| TtsError::NetworkError(e.to_string()))?;

            tokio::fs::write(out, &bytes)
                .await
                .map_err(|e| TtsError::IoError(format!("{}: {}", out.display(), e)))?;

            info!(bytes = bytes.len(), "ElevenLabs TTS synthesis complete");
            Ok(())
        })
    }

    fn name(&self) -> String {
        format!("ElevenLabs ({})", self.voice_id)
    }
}
