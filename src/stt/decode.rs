//! Audio file to 16 kHz mono f32 PCM via Symphonia.
//!
//! Formats Symphonia can't read (browser webm/opus recordings) are first
//! converted to WAV with `ffmpeg`.

use std::path::{Path, PathBuf};
use std::process::Command;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

/// Sample rate whisper.cpp expects.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Converter used for formats Symphonia can't decode.
pub const FFMPEG_PROGRAM: &str = "ffmpeg";

/// Decode an audio file and resample it to 16 kHz mono.
pub fn decode_to_whisper_pcm(path: &Path) -> anyhow::Result<Vec<f32>> {
    match decode_mono(path) {
        Ok((samples, rate)) => Ok(resample_linear(&samples, rate, TARGET_SAMPLE_RATE)),
        Err(e) => {
            warn!(path = %path.display(), "Symphonia can't decode upload ({}), trying ffmpeg", e);
            let converted = converted_path(path);
            let result = convert_with_ffmpeg(path, &converted).and_then(|()| decode_mono(&converted));
            let _ = std::fs::remove_file(&converted);
            result
                .map(|(samples, rate)| resample_linear(&samples, rate, TARGET_SAMPLE_RATE))
                .map_err(|ffmpeg_err| anyhow::anyhow!("{}; {}", e, ffmpeg_err))
        }
    }
}

/// Sibling path the ffmpeg output is written to.
fn converted_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    path.with_file_name(format!("{}.16k.wav", stem))
}

fn ffmpeg_args(input: &Path, output: &Path) -> Vec<String> {
    let rate = TARGET_SAMPLE_RATE.to_string();
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-ar".to_string(),
        rate,
        "-ac".to_string(),
        "1".to_string(),
        "-f".to_string(),
        "wav".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Convert `input` to 16 kHz mono WAV at `output`. Blocking.
fn convert_with_ffmpeg(input: &Path, output: &Path) -> anyhow::Result<()> {
    let result = Command::new(FFMPEG_PROGRAM)
        .args(ffmpeg_args(input, output))
        .output()
        .map_err(|e| anyhow::anyhow!("{} failed to execute: {}", FFMPEG_PROGRAM, e))?;
    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        anyhow::bail!("{} exited with {}: {}", FFMPEG_PROGRAM, result.status, stderr.trim());
    }
    Ok(())
}

/// Decode to mono f32 at the file's native sample rate.
pub fn decode_mono(path: &Path) -> anyhow::Result<(Vec<f32>, u32)> {
    let file = std::fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.display(), e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| anyhow::anyhow!("Unsupported audio format: {}", e))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("No audio track in {}", path.display()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow::anyhow!("Unknown sample rate in {}", path.display()))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| anyhow::anyhow!("Audio decoder init failed: {}", e))?;

    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => anyhow::bail!("Audio decode error: {}", e),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                warn!("Audio packet decode error (skipping): {}", e);
                continue;
            }
        };
        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        downmix_into(sample_buf.samples(), channels, &mut mono);
    }

    Ok((mono, sample_rate))
}

/// Average interleaved frames into `out`.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Linear-interpolation resampler.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let out_len = (input.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = input[idx.min(input.len() - 1)];
            let b = input[(idx + 1).min(input.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}
