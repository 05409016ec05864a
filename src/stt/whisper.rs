//! Local whisper.cpp STT via whisper-rs.
//!
//! The real implementation is gated behind `#[cfg(feature = "whisper")]`.
//! When the feature is disabled, a stub is provided that always returns an error.
//!
//! Models are fetched from HuggingFace into `<data_dir>/models` when missing.

use std::path::{Path, PathBuf};

use tracing::info;

/// Path of the GGML model file for `size` ("tiny", "base", "small", ...).
pub fn model_path(data_dir: &Path, size: &str) -> PathBuf {
    data_dir.join("models").join(format!("ggml-{}.bin", size))
}

/// Download a whisper GGML model from HuggingFace if not already present.
pub async fn ensure_model(data_dir: &Path, size: &str) -> anyhow::Result<PathBuf> {
    let model_path = model_path(data_dir, size);

    if model_path.exists() {
        info!(path = %model_path.display(), "Whisper model already present");
        return Ok(model_path);
    }

    tokio::fs::create_dir_all(data_dir.join("models")).await?;

    let url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-{}.bin",
        size
    );
    info!(url = %url, dest = %model_path.display(), "Downloading whisper model");

    let resp = reqwest::get(&url).await?;
    if !resp.status().is_success() {
        anyhow::bail!("Failed to download whisper model: HTTP {}", resp.status());
    }
    let total_size = resp.content_length();

    // Partial downloads never land at the final path.
    let tmp_path = model_path.with_extension("bin.tmp");
    let mut file = tokio::fs::File::create(&tmp_path).await?;

    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let mut downloaded: u64 = 0;
    let mut last_progress: u8 = 0;
    let mut stream = resp.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            let pct = ((downloaded as f64 / total as f64) * 100.0) as u8;
            if pct >= last_progress + 10 {
                last_progress = pct;
                info!(size, percent = pct, "Whisper model download progress");
            }
        }
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&tmp_path, &model_path).await?;

    info!(path = %model_path.display(), bytes = downloaded, "Whisper model downloaded");
    Ok(model_path)
}

// ── whisper enabled ────────────────────────────────────────────────
#[cfg(feature = "whisper")]
mod inner {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use tracing::info;
    use whisper_rs::{
        FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
    };

    use crate::stt::decode::decode_to_whisper_pcm;
    use crate::stt::SttEngine;

    /// Clips shorter than 0.4 s at 16 kHz are treated as silence.
    const MIN_SAMPLES: usize = 6_400;

    fn inference_threads() -> i32 {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores / 2).clamp(1, 8) as i32
    }

    /// Context plus a state reused across calls.
    struct WhisperInner {
        ctx: WhisperContext,
        cached_state: Option<WhisperState>,
    }

    // SAFETY: access to the context and state is serialized by the Mutex.
    unsafe impl Send for WhisperInner {}
    unsafe impl Sync for WhisperInner {}

    pub struct WhisperStt {
        inner: Arc<Mutex<WhisperInner>>,
        n_threads: i32,
    }

    impl WhisperStt {
        /// Load a GGML whisper model from disk.
        pub fn new(model_path: &Path) -> anyhow::Result<Self> {
            if !model_path.exists() {
                anyhow::bail!("Whisper model not found: {}", model_path.display());
            }
            let path = model_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Non UTF-8 model path: {}", model_path.display()))?;
            let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
                .map_err(|e| anyhow::anyhow!("Failed to load whisper model: {}", e))?;

            let n_threads = inference_threads();
            info!(model = %model_path.display(), threads = n_threads, "Whisper model loaded");
            Ok(Self {
                inner: Arc::new(Mutex::new(WhisperInner {
                    ctx,
                    cached_state: None,
                })),
                n_threads,
            })
        }
    }

    impl SttEngine for WhisperStt {
        async fn transcribe(&self, audio_path: &Path) -> anyhow::Result<String> {
            let audio_path = audio_path.to_path_buf();
            let inner = Arc::clone(&self.inner);
            let n_threads = self.n_threads;

            tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
                let audio = decode_to_whisper_pcm(&audio_path)?;
                if audio.len() < MIN_SAMPLES {
                    return Ok(String::new());
                }

                let mut guard = inner
                    .lock()
                    .map_err(|_| anyhow::anyhow!("Whisper state lock poisoned"))?;

                let mut state = match guard.cached_state.take() {
                    Some(s) => s,
                    None => {
                        info!("Creating whisper state (first transcription)");
                        guard
                            .ctx
                            .create_state()
                            .map_err(|e| anyhow::anyhow!("Failed to create whisper state: {}", e))?
                    }
                };

                let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
                // Multilingual model; detect the spoken language.
                params.set_language(Some("auto"));
                params.set_n_threads(n_threads);
                params.set_print_special(false);
                params.set_print_progress(false);
                params.set_print_realtime(false);
                params.set_print_timestamps(false);
                params.set_no_timestamps(true);
                params.set_suppress_non_speech_tokens(true);

                state
                    .full(params, &audio)
                    .map_err(|e| anyhow::anyhow!("Whisper inference failed: {}", e))?;

                let num_segments = state
                    .full_n_segments()
                    .map_err(|e| anyhow::anyhow!("Failed to get segment count: {}", e))?;
                let text = (0..num_segments)
                    .filter_map(|i| state.full_get_segment_text(i).ok())
                    .map(|seg| seg.trim().to_string())
                    .filter(|seg| !seg.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");

                guard.cached_state = Some(state);
                Ok(text)
            })
            .await
            .map_err(|e| anyhow::anyhow!("Whisper task panicked: {}", e))?
        }
    }
}

// ── whisper disabled (stub) ────────────────────────────────────────
#[cfg(not(feature = "whisper"))]
mod inner {
    use std::path::Path;

    use tracing::warn;

    use crate::stt::SttEngine;

    pub struct WhisperStt;

    impl WhisperStt {
        pub fn new(model_path: &Path) -> anyhow::Result<Self> {
            warn!(
                model = %model_path.display(),
                "Whisper STT requested but whisper feature is disabled"
            );
            anyhow::bail!("Local whisper STT is not available (compile with --features whisper)")
        }
    }

    impl SttEngine for WhisperStt {
        async fn transcribe(&self, _audio_path: &Path) -> anyhow::Result<String> {
            anyhow::bail!("Local whisper STT is not available (compile with --features whisper)")
        }
    }
}

pub use inner::WhisperStt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_layout() {
        let dir = PathBuf::from("/data");
        assert_eq!(model_path(&dir, "base"), PathBuf::from("/data/models/ggml-base.bin"));
    }

    #[tokio::test]
    async fn test_existing_model_is_not_downloaded() {
        let dir = std::env::temp_dir().join("daymind-test-whisper-model");
        let path = model_path(&dir, "tiny");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"ggml").unwrap();

        assert_eq!(ensure_model(&dir, "tiny").await.unwrap(), path);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_stub_refuses_to_load() {
        let err = WhisperStt::new(Path::new("/nonexistent/ggml-base.bin")).err().unwrap();
        assert!(err.to_string().contains("--features whisper"));
    }
}
