//! Configuration reading and data directory paths.
//!
//! Settings are layered: `<data_dir>/daymind_config.json` first, then `.env`,
//! then the process environment. Every field is optional in the file.

pub mod paths;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use paths::get_data_dir;

/// Default ElevenLabs voice ("Rachel").
pub const DEFAULT_ELEVENLABS_VOICE_ID: &str = "zSiMZcCo0oBh047sunsX";

/// Per-provider LLM settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// ElevenLabs cloud TTS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevenLabsSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,
}

impl Default for ElevenLabsSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            voice_id: default_voice_id(),
            base_url: None,
            model_id: None,
            timeout_secs: default_tts_timeout(),
        }
    }
}

/// Speech-to-text adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SttSettings {
    /// One of "groq-cloud", "openai-cloud", "whisper-local".
    #[serde(default = "default_stt_adapter")]
    pub adapter: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// GGML model size for whisper-local ("tiny", "base", "small", ...).
    #[serde(default = "default_whisper_size")]
    pub whisper_model_size: String,
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            adapter: default_stt_adapter(),
            api_key: None,
            endpoint: None,
            model: None,
            whisper_model_size: default_whisper_size(),
        }
    }
}

/// daymind_config.json shape, merged with environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaymindConfig {
    /// Where the JSON stores, audio output and logs live. Not read from the file.
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Active provider: "groq", "anthropic" or "openai".
    #[serde(default = "default_provider")]
    pub ai_provider: String,
    #[serde(default)]
    pub groq: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub openai: ProviderSettings,
    /// LLM requests run without a timeout unless this is set.
    #[serde(default)]
    pub llm_timeout_secs: Option<u64>,
    #[serde(default)]
    pub elevenlabs: ElevenLabsSettings,
    /// Local TTS program; defaults to `say` on macOS and `espeak-ng` elsewhere.
    #[serde(default)]
    pub local_tts_command: Option<String>,
    #[serde(default)]
    pub stt: SttSettings,
    /// Problems found while loading. Loading runs before logging is set up,
    /// so the caller reports these afterwards.
    #[serde(skip)]
    pub load_warnings: Vec<String>,
}

impl Default for DaymindConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            host: default_host(),
            port: default_port(),
            ai_provider: default_provider(),
            groq: ProviderSettings::default(),
            anthropic: ProviderSettings::default(),
            openai: ProviderSettings::default(),
            llm_timeout_secs: None,
            elevenlabs: ElevenLabsSettings::default(),
            local_tts_command: None,
            stt: SttSettings::default(),
            load_warnings: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_voice_id() -> String {
    DEFAULT_ELEVENLABS_VOICE_ID.to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_stt_adapter() -> String {
    "groq-cloud".to_string()
}

fn default_whisper_size() -> String {
    "base".to_string()
}

impl DaymindConfig {
    /// Load configuration from disk and the process environment.
    pub fn load() -> Self {
        // Missing .env is the normal case.
        let _ = dotenvy::dotenv();
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables.
    pub fn load_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("DAYMIND_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(get_data_dir);

        let (mut config, file_warning) = match read_json_file::<DaymindConfig>(&config_path(&data_dir)) {
            Ok(file) => (file.unwrap_or_default(), None),
            Err(warning) => (DaymindConfig::default(), Some(warning)),
        };
        config.data_dir = data_dir;
        config.load_warnings.extend(file_warning);
        config.apply_env(lookup);
        config
    }

    /// Override file values with any environment variables that are set.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DAYMIND_HOST") {
            self.host = v;
        }
        if let Some(v) = get("DAYMIND_PORT") {
            match v.parse() {
                Ok(port) => self.port = port,
                Err(_) => self
                    .load_warnings
                    .push(format!("Ignoring invalid DAYMIND_PORT: {}", v)),
            }
        }
        if let Some(v) = get("AI_PROVIDER") {
            self.ai_provider = v;
        }
        if let Some(v) = get("GROQ_API_KEY") {
            self.groq.api_key = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get("ELEVENLABS_API_KEY") {
            self.elevenlabs.api_key = Some(v);
        }
        if let Some(v) = get("ELEVENLABS_VOICE_ID") {
            self.elevenlabs.voice_id = v;
        }
        if let Some(v) = get("STT_ADAPTER") {
            self.stt.adapter = v;
        }
        if let Some(v) = get("LOCAL_TTS_COMMAND") {
            self.local_tts_command = Some(v);
        }
    }

    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join("memory.json")
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("journal.json")
    }

    /// Fixed path every synthesized reply is rendered to.
    pub fn audio_output_path(&self) -> PathBuf {
        self.data_dir.join("output.wav")
    }

    /// API key the speech recognizer should use for its cloud adapter.
    pub fn stt_api_key(&self) -> Option<&str> {
        if let Some(key) = self.stt.api_key.as_deref() {
            return Some(key);
        }
        match self.stt.adapter.as_str() {
            "openai-cloud" => self.openai.api_key.as_deref(),
            _ => self.groq.api_key.as_deref(),
        }
    }
}

/// Path to daymind_config.json.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("daymind_config.json")
}

/// Read a JSON file and deserialize it. A missing file is `Ok(None)`; an
/// unreadable or unparsable one is described in the error.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
    }
}
