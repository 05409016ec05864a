//! Text-to-Speech for assistant replies.
//!
//! Replies are rendered to one fixed output file. The cloud engine
//! (ElevenLabs) is tried first; a local command-line engine covers missing
//! keys and API failures. When both fail the reply simply has no audio.

pub mod cloud;
pub mod local;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::{info, warn};

use crate::config::DaymindConfig;

// ── Emotion ─────────────────────────────────────────────────────────

/// Label that selects voice parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emotion {
    #[default]
    Friendly,
    Excited,
    Calm,
    Serious,
    Empathetic,
}

/// ElevenLabs `voice_settings` for one emotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
}

impl Emotion {
    /// Parse an emotion label. Unknown labels are `Friendly`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "excited" => Self::Excited,
            "calm" => Self::Calm,
            "serious" => Self::Serious,
            "empathetic" => Self::Empathetic,
            _ => Self::Friendly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Excited => "excited",
            Self::Calm => "calm",
            Self::Serious => "serious",
            Self::Empathetic => "empathetic",
        }
    }

    pub fn voice_settings(&self) -> VoiceSettings {
        let (stability, similarity_boost, style) = match self {
            Self::Friendly => (0.5, 0.75, 0.0),
            Self::Excited => (0.3, 0.8, 0.5),
            Self::Calm => (0.7, 0.6, 0.0),
            Self::Serious => (0.6, 0.7, 0.2),
            Self::Empathetic => (0.5, 0.75, 0.3),
        };
        VoiceSettings {
            stability,
            similarity_boost,
            style,
        }
    }

    /// Local engine speaking rate, in words per minute.
    pub fn speaking_rate(&self) -> u32 {
        match self {
            Self::Excited => 180,
            Self::Calm => 140,
            Self::Serious => 150,
            Self::Friendly => 160,
            Self::Empathetic => 145,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TtsError {
    /// No API key configured for a cloud engine.
    MissingKey,
    /// Transport failure talking to a cloud engine.
    NetworkError(String),
    /// Cloud engine answered with a non-2xx status.
    ApiError { status: u16, body: String },
    /// Local engine missing or exited unsuccessfully.
    EngineError(String),
    /// Writing the output file failed.
    IoError(String),
}

impl fmt::Display for TtsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey => write!(f, "TTS API key not configured"),
            Self::NetworkError(msg) => write!(f, "TTS network error: {}", msg),
            Self::ApiError { status, body } => write!(f, "TTS API error {}: {}", status, body),
            Self::EngineError(msg) => write!(f, "TTS engine error: {}", msg),
            Self::IoError(msg) => write!(f, "TTS output error: {}", msg),
        }
    }
}

impl std::error::Error for TtsError {}

// ── Engine trait ────────────────────────────────────────────────────

/// Common trait for all TTS engines (dyn-compatible).
pub trait TtsEngine: Send + Sync {
    /// Render `text` spoken with `emotion` into the audio file at `out`.
    fn synthesize_to_file<'a>(
        &'a self,
        text: &'a str,
        emotion: Emotion,
        out: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), TtsError>> + Send + 'a>>;

    /// Display name (e.g. "ElevenLabs (zSiMZcCo0oBh047sunsX)").
    fn name(&self) -> String;
}

// ── Synthesizer ─────────────────────────────────────────────────────

/// Tries each engine in order until one renders the output file.
pub struct SpeechSynthesizer {
    engines: Vec<Box<dyn TtsEngine>>,
    output_path: PathBuf,
}

impl SpeechSynthesizer {
    pub fn new(engines: Vec<Box<dyn TtsEngine>>, output_path: PathBuf) -> Self {
        Self {
            engines,
            output_path,
        }
    }

    /// ElevenLabs first, then the local engine.
    pub fn from_config(config: &DaymindConfig) -> anyhow::Result<Self> {
        let cloud = cloud::ElevenLabsTts::new(&config.elevenlabs)?;
        let local = local::LocalTts::new(config.local_tts_command.as_deref());
        info!(primary = %cloud.name(), fallback = %local.name(), "TTS engines configured");
        Ok(Self::new(
            vec![Box::new(cloud), Box::new(local)],
            config.audio_output_path(),
        ))
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Render `text` to the output file. `None` when every engine failed.
    pub async fn synthesize(&self, text: &str, emotion: Emotion) -> Option<PathBuf> {
        for engine in &self.engines {
            match engine.synthesize_to_file(text, emotion, &self.output_path).await {
                Ok(()) => {
                    info!(engine = %engine.name(), emotion = %emotion, "Speech rendered");
                    return Some(self.output_path.clone());
                }
                Err(e) => warn!(engine = %engine.name(), "TTS failed: {}", e),
            }
        }
        None
    }
}

/// MIME type of a rendered audio file, from its leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"RIFF") {
        "audio/wav"
    } else {
        "audio/mpeg"
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{synthesizer, ScriptedTts};
    use super::*;
    use std::env;
    use std::fs;
    use std::sync::atomic::Ordering;

    fn test_output(test_name: &str) -> PathBuf {
        let dir = env::temp_dir().join("daymind-test-tts").join(test_name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create test dir");
        dir.join("output.wav")
    }

    #[test]
    fn test_emotion_parse_and_table() {
        assert_eq!(Emotion::parse("Excited"), Emotion::Excited);
        assert_eq!(Emotion::parse("grumpy"), Emotion::Friendly);
        assert_eq!(Emotion::default(), Emotion::Friendly);

        let calm = Emotion::Calm.voice_settings();
        assert_eq!(calm.stability, 0.7);
        assert_eq!(calm.similarity_boost, 0.6);
        assert_eq!(calm.style, 0.0);
        assert_eq!(Emotion::Empathetic.voice_settings().style, 0.3);
    }

    #[test]
    fn test_speaking_rates() {
        assert_eq!(Emotion::Excited.speaking_rate(), 180);
        assert_eq!(Emotion::Calm.speaking_rate(), 140);
        assert_eq!(Emotion::Serious.speaking_rate(), 150);
        assert_eq!(Emotion::Friendly.speaking_rate(), 160);
        assert_eq!(Emotion::Empathetic.speaking_rate(), 145);
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(b"RIFF\x24\x00\x00\x00WAVEfmt "), "audio/wav");
        assert_eq!(sniff_content_type(b"ID3\x04\x00"), "audio/mpeg");
        assert_eq!(sniff_content_type(b""), "audio/mpeg");
    }

    #[tokio::test]
    async fn test_primary_engine_wins() {
        let out = test_output("primary");
        let local = ScriptedTts::writing("local", b"RIFF-local");
        let local_calls = local.calls.clone();
        let tts = synthesizer(vec![ScriptedTts::writing("cloud", b"ID3-cloud"), local], out.clone());

        assert_eq!(tts.synthesize("hello", Emotion::Calm).await, Some(out.clone()));
        assert_eq!(fs::read(&out).unwrap(), b"ID3-cloud");
        assert_eq!(local_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_key_falls_back_to_local() {
        let out = test_output("fallback");
        let local = ScriptedTts::writing("local", b"RIFF-local");
        let emotion = local.last_emotion.clone();
        let tts = synthesizer(
            vec![ScriptedTts::failing("cloud", TtsError::MissingKey), local],
            out.clone(),
        );

        assert_eq!(tts.synthesize("hello", Emotion::Serious).await, Some(out.clone()));
        assert_eq!(fs::read(&out).unwrap(), b"RIFF-local");
        assert_eq!(*emotion.lock().unwrap(), Some(Emotion::Serious));
    }

    #[tokio::test]
    async fn test_all_engines_failing_yields_none() {
        let out = test_output("none");
        let tts = synthesizer(
            vec![
                ScriptedTts::failing(
                    "cloud",
                    TtsError::ApiError {
                        status: 401,
                        body: "unauthorized".into(),
                    },
                ),
                ScriptedTts::failing("local", TtsError::EngineError("espeak-ng not found".into())),
            ],
            out,
        );
        assert_eq!(tts.synthesize("hello", Emotion::Friendly).await, None);
    }
}
