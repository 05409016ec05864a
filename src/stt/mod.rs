//! Speech-to-Text adapters.
//!
//! Provides a common `SttEngine` trait with implementations for:
//! - Groq and OpenAI Whisper APIs (cloud, multipart upload of the file)
//! - Local whisper.cpp inference (behind the `whisper` feature)

pub mod cloud;
pub mod decode;
pub mod whisper;

use std::path::Path;

use tracing::info;

use crate::config::DaymindConfig;

/// Common trait for all STT engines.
#[allow(async_fn_in_trait)]
pub trait SttEngine: Send + Sync {
    /// Transcribe the audio file at `audio_path` to text.
    async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<String>;
}

/// Enum-dispatch wrapper over all STT backends.
///
/// This avoids dyn-compatibility issues with async trait methods.
pub enum SttAdapter {
    Cloud(cloud::CloudStt),
    Whisper(whisper::WhisperStt),
}

impl SttAdapter {
    /// Transcribe audio using the underlying engine.
    pub async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<String> {
        match self {
            Self::Cloud(e) => e.transcribe(audio_path).await,
            Self::Whisper(e) => e.transcribe(audio_path).await,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Cloud(e) => e.name(),
            Self::Whisper(_) => "whisper-local".to_string(),
        }
    }
}

/// Create an STT engine from config values.
///
/// `stt.adapter` is one of: "groq-cloud", "openai-cloud", "whisper-local".
/// The local adapter downloads its model first when it is missing.
pub async fn create_stt_engine(config: &DaymindConfig) -> anyhow::Result<SttAdapter> {
    let stt = &config.stt;
    let adapter = match stt.adapter.as_str() {
        "groq-cloud" => {
            let key = config
                .stt_api_key()
                .ok_or_else(|| anyhow::anyhow!("Groq STT requires an API key"))?;
            SttAdapter::Cloud(cloud::CloudStt::groq(
                key,
                stt.endpoint.as_deref(),
                stt.model.as_deref(),
            ))
        }
        "openai-cloud" => {
            let key = config
                .stt_api_key()
                .ok_or_else(|| anyhow::anyhow!("OpenAI STT requires an API key"))?;
            SttAdapter::Cloud(cloud::CloudStt::openai(
                key,
                stt.endpoint.as_deref(),
                stt.model.as_deref(),
            ))
        }
        "whisper-local" => {
            let model_path = whisper::ensure_model(&config.data_dir, &stt.whisper_model_size).await?;
            SttAdapter::Whisper(whisper::WhisperStt::new(&model_path)?)
        }
        other => anyhow::bail!("Unknown STT adapter: {}", other),
    };
    info!(adapter = %adapter.name(), "Speech recognizer ready");
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cloud_adapters_need_a_key() {
        let config = DaymindConfig::default();
        let err = create_stt_engine(&config).await.err().unwrap();
        assert!(err.to_string().contains("requires an API key"));
    }

    #[tokio::test]
    async fn test_groq_adapter_uses_groq_key() {
        let mut config = DaymindConfig::default();
        config.groq.api_key = Some("gsk-test".into());
        let adapter = create_stt_engine(&config).await.unwrap();
        assert_eq!(adapter.name(), "groq (whisper-large-v3-turbo)");
    }

    #[tokio::test]
    async fn test_unknown_adapter_is_rejected() {
        let mut config = DaymindConfig::default();
        config.stt.adapter = "vosk".into();
        let err = create_stt_engine(&config).await.err().unwrap();
        assert_eq!(err.to_string(), "Unknown STT adapter: vosk");
    }
}
