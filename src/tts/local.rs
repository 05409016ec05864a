//! Local command-line speech engine: `espeak-ng`, or `say` on macOS.
//!
//! Used when the cloud engine is unavailable. Writes a WAV file.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{Emotion, TtsEngine, TtsError};

/// Output volume, 0.0 - 1.0.
pub const VOLUME: f32 = 0.95;

/// Preferred voice name fragments, matched case-insensitively.
const PREFERRED_VOICES: &[&str] = &["zira", "female"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Espeak,
    Say,
}

pub struct LocalTts {
    program: String,
    flavor: Flavor,
    voice: OnceCell<Option<String>>,
}

impl LocalTts {
    /// `program` overrides the platform default engine.
    pub fn new(program: Option<&str>) -> Self {
        let program = program
            .map(|p| p.to_string())
            .unwrap_or_else(|| default_program().to_string());
        let flavor = if Path::new(&program)
            .file_stem()
            .is_some_and(|s| s.to_string_lossy() == "say")
        {
            Flavor::Say
        } else {
            Flavor::Espeak
        };
        Self {
            program,
            flavor,
            voice: OnceCell::new(),
        }
    }

    /// Voice chosen from the engine's installed voices, looked up once.
    async fn voice(&self) -> Option<&str> {
        self.voice
            .get_or_init(|| async {
                let listing = self.list_voices().await.unwrap_or_default();
                let names = match self.flavor {
                    Flavor::Espeak => parse_espeak_voices(&listing),
                    Flavor::Say => parse_say_voices(&listing),
                };
                let chosen = choose_voice(&names).map(|s| s.to_string());
                debug!(voice = ?chosen, available = names.len(), "Local TTS voice selected");
                chosen
            })
            .await
            .as_deref()
    }

    async fn list_voices(&self) -> Option<String> {
        let mut cmd = Command::new(&self.program);
        match self.flavor {
            Flavor::Espeak => cmd.arg("--voices"),
            Flavor::Say => cmd.args(["-v", "?"]),
        };
        let output = cmd.output().await.ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn build_args(&self, text: &str, emotion: Emotion, voice: Option<&str>, out: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(v) = voice {
            args.push("-v".to_string());
            args.push(v.to_string());
        }
        let rate = emotion.speaking_rate().to_string();
        let out = out.to_string_lossy().to_string();
        match self.flavor {
            Flavor::Espeak => {
                // espeak-ng amplitude is 0-200 with 100 as normal.
                let amplitude = ((VOLUME * 100.0).round() as u32).to_string();
                args.extend(["-s".to_string(), rate, "-a".to_string(), amplitude]);
                // Replies often start with a markdown bullet.
                args.extend(["-w".to_string(), out, "--".to_string(), text.to_string()]);
            }
            Flavor::Say => {
                args.extend(["-r".to_string(), rate]);
                args.extend([
                    "--file-format=WAVE".to_string(),
                    "--data-format=LEI16@22050".to_string(),
                    "-o".to_string(),
                    out,
                ]);
                args.push(format!("[[volm {:.2}]] {}", VOLUME, text));
            }
        }
        args
    }
}

impl TtsEngine for LocalTts {
    fn synthesize_to_file<'a>(
        &'a self,
        text: &'a str,
        emotion: Emotion,
        out: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), TtsError>> + Send + 'a>> {
        Box::pin(async move {
            let voice = self.voice().await;
            let args = self.build_args(text, emotion, voice, out);

            let output = Command::new(&self.program)
                .args(&args)
                .output()
                .await
                .map_err(|e| TtsError::EngineError(format!("{} failed to execute: {}", self.program, e)))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(TtsError::EngineError(format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                )));
            }
            if !out.exists() {
                return Err(TtsError::IoError(format!("{} was not written", out.display())));
            }

            info!(program = %self.program, emotion = %emotion, "Local TTS synthesis complete");
            Ok(())
        })
    }

    fn name(&self) -> String {
        format!("Local ({})", self.program)
    }
}

fn default_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak-ng"
    }
}

/// First voice whose name contains a preferred fragment.
pub fn choose_voice(names: &[String]) -> Option<&str> {
    names
        .iter()
        .find(|name| {
            let lower = name.to_lowercase();
            PREFERRED_VOICES.iter().any(|p| lower.contains(p))
        })
        .map(|s| s.as_str())
}

/// Voice names from `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
/// ```
pub fn parse_espeak_voices(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(|s| s.to_string())
        .collect()
}

/// Voice names from `say -v ?`. Names may contain spaces and end before the
/// locale column.
///
/// ```text
/// Alex                en_US    # Most people recognize me by my voice.
/// Bad News            en_US    # The light you see at the end of the tunnel...
/// ```
pub fn parse_say_voices(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let before_comment = line.split('#').next()?;
            let mut tokens: Vec<&str> = before_comment.split_whitespace().collect();
            tokens.pop()?;
            (!tokens.is_empty()).then(|| tokens.join(" "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_flavor_from_program() {
        assert_eq!(LocalTts::new(Some("say")).flavor, Flavor::Say);
        assert_eq!(LocalTts::new(Some("/usr/bin/say")).flavor, Flavor::Say);
        assert_eq!(LocalTts::new(Some("espeak-ng")).flavor, Flavor::Espeak);
        assert_eq!(LocalTts::new(Some("espeak")).flavor, Flavor::Espeak);
    }

    #[test]
    fn test_choose_voice_prefers_female() {
        let names = vec!["Alex".to_string(), "Microsoft Zira Desktop".to_string()];
        assert_eq!(choose_voice(&names), Some("Microsoft Zira Desktop"));

        let names = vec!["English_(America)".to_string(), "female2".to_string()];
        assert_eq!(choose_voice(&names), Some("female2"));

        let names = vec!["Daniel".to_string()];
        assert_eq!(choose_voice(&names), None);
    }

    #[test]
    fn test_parse_espeak_voices() {
        let listing = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
                       5  af              --/M      Afrikaans          gmw/af\n \
                       5  en-us           --/M      English_(America)  gmw/en-US            (en 10)\n";
        assert_eq!(parse_espeak_voices(listing), vec!["Afrikaans", "English_(America)"]);
    }

    #[test]
    fn test_parse_say_voices() {
        let listing = "Alex                en_US    # Most people recognize me by my voice.\n\
                       Bad News            en_US    # The light you see at the end of the tunnel.\n";
        assert_eq!(parse_say_voices(listing), vec!["Alex", "Bad News"]);
    }

    #[test]
    fn test_espeak_args() {
        let tts = LocalTts::new(Some("espeak-ng"));
        let out = PathBuf::from("/tmp/output.wav");
        let args = tts.build_args("Hello there", Emotion::Calm, Some("female2"), &out);
        assert_eq!(
            args,
            vec!["-v", "female2", "-s", "140", "-a", "95", "-w", "/tmp/output.wav", "--", "Hello there"]
        );
    }

    #[test]
    fn test_espeak_args_terminate_options_before_text() {
        let tts = LocalTts::new(Some("espeak-ng"));
        let out = PathBuf::from("/tmp/output.wav");
        let args = tts.build_args("- Take a short walk after lunch", Emotion::Friendly, None, &out);
        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "- Take a short walk after lunch");
    }

    #[test]
    fn test_say_args() {
        let tts = LocalTts::new(Some("say"));
        let out = PathBuf::from("/tmp/output.wav");
        let args = tts.build_args("Hello", Emotion::Excited, None, &out);
        assert_eq!(args[0..2], ["-r", "180"]);
        assert!(args.contains(&"--file-format=WAVE".to_string()));
        assert_eq!(args.last().unwrap(), "[[volm 0.95]] Hello");
    }

    #[tokio::test]
    async fn test_missing_program_is_engine_error() {
        let tts = LocalTts::new(Some("daymind-no-such-tts-program"));
        let out = std::env::temp_dir().join("daymind-test-local-tts-missing.wav");
        let result = tts.synthesize_to_file("hi", Emotion::Friendly, &out).await;
        assert!(matches!(result, Err(TtsError::EngineError(_))));
    }
}
