//! Speech-to-text transcription using whisper-rs.
//!
//! Telegram voice notes arrive as OGG Opus; ffmpeg turns them into 16KHz mono PCM
//! before Whisper sees them.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::chatbot::format::truncate_chars;

/// Audio bytes in, transcript out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, String>;
}

/// Whisper transcription engine.
pub struct Whisper {
    ctx: Arc<WhisperContext>,
}

impl Whisper {
    /// Load a Whisper model from a .bin file.
    pub fn new(model_path: &Path) -> Result<Self, String> {
        info!("🎤 Loading Whisper model from {:?}", model_path);

        if !model_path.exists() {
            return Err(format!("Model file not found: {:?}", model_path));
        }

        let ctx = WhisperContext::new_with_params(
            model_path.to_str().ok_or("Invalid model path")?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| format!("Failed to load Whisper model: {e}"))?;

        info!("🎤 Whisper model loaded");
        Ok(Self { ctx: Arc::new(ctx) })
    }

    fn transcribe_blocking(ctx: &WhisperContext, ogg_data: &[u8]) -> Result<String, String> {
        debug!("Transcribing {} bytes of audio", ogg_data.len());

        let pcm_data = convert_ogg_to_pcm(ogg_data)?;

        let mut state = ctx
            .create_state()
            .map_err(|e| format!("Failed to create Whisper state: {e}"))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some("auto"));
        params.set_translate(false);
        params.set_no_timestamps(true);
        params.set_single_segment(false);

        state
            .full(params, &pcm_data)
            .map_err(|e| format!("Whisper transcription failed: {e}"))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            if let Ok(s) = segment.to_str() {
                text.push_str(s);
                text.push(' ');
            }
        }

        let text = text.trim().to_string();
        info!("🎤 Transcribed: \"{}\"", truncate_chars(&text, 100));
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for Whisper {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, String> {
        let ctx = self.ctx.clone();
        let text = tokio::task::spawn_blocking(move || Self::transcribe_blocking(&ctx, &audio))
            .await
            .map_err(|e| format!("Transcription task failed: {e}"))??;

        if text.is_empty() {
            return Err("No speech detected".to_string());
        }
        Ok(text)
    }
}

/// Convert OGG Opus audio to 16KHz mono f32 PCM samples using ffmpeg.
fn convert_ogg_to_pcm(ogg_data: &[u8]) -> Result<Vec<f32>, String> {
    // ffmpeg needs seekable input for OGG
    let mut input = tempfile::Builder::new()
        .prefix("voice_")
        .suffix(".ogg")
        .tempfile()
        .map_err(|e| format!("Failed to create temp input: {e}"))?;
    input
        .write_all(ogg_data)
        .map_err(|e| format!("Failed to write temp input: {e}"))?;

    let input_path = input.path().to_str().ok_or("Invalid temp path")?;

    let output = Command::new("ffmpeg")
        .args([
            "-i", input_path,
            "-ar", "16000",
            "-ac", "1",
            "-f", "s16le",
            "-acodec", "pcm_s16le",
            "-y",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("Failed to run ffmpeg: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("ffmpeg failed: {}", stderr));
    }

    let samples = pcm_s16le_to_f32(&output.stdout);
    debug!("Converted to {} f32 samples", samples.len());
    Ok(samples)
}

fn pcm_s16le_to_f32(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}
