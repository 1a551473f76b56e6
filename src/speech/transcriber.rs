// Speech-to-text over canonical decoded audio
//
// The whisper context is expensive to load, so one process-wide instance is
// created lazily behind an init lock and reused read-only afterwards. The
// transcriber never raises: every internal failure becomes a fallback
// Transcript carrying the error marker, which the orchestrator reports as a
// degraded (not fatal) outcome.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::DecodedAudio;
use crate::config::SpeechConfig;

/// Prefix of every fallback transcript text
pub const TRANSCRIPTION_ERROR_MARKER: &str = "[transcription failed]";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum TranscriptSource {
    /// Clean model output
    Ok,
    /// Transcription failed; carries the human-readable reason
    Fallback(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub text: String,
    pub source: TranscriptSource,
}

impl Transcript {
    pub fn fallback(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            text: format!("{} {}", TRANSCRIPTION_ERROR_MARKER, reason),
            source: TranscriptSource::Fallback(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, TranscriptSource::Fallback(_))
    }
}

/// Seam for the speech-recognition capability. Structurally infallible:
/// implementations convert internal errors into fallback transcripts.
pub trait Transcribe: Send + Sync {
    fn transcribe(&self, audio: &DecodedAudio) -> Transcript;
}

/// whisper.cpp-backed transcriber with one-time lazy model load
pub struct WhisperTranscriber {
    model_path: String,
    language: String,
    context: OnceLock<WhisperContext>,
    init_lock: Mutex<()>,
}

impl WhisperTranscriber {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            language: config.language.clone(),
            context: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Load the model exactly once, even when concurrent requests race on
    /// first use. The init lock serializes the load; the OnceLock makes the
    /// handle read-only afterwards.
    fn context(&self) -> Result<&WhisperContext> {
        if self.context.get().is_none() {
            let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
            if self.context.get().is_none() {
                info!("Loading speech model: {}", self.model_path);
                let ctx = WhisperContext::new_with_params(
                    &self.model_path,
                    WhisperContextParameters::default(),
                )
                .with_context(|| {
                    format!("failed to load speech model from {}", self.model_path)
                })?;
                let _ = self.context.set(ctx);
                info!("Speech model loaded");
            }
        }

        self.context
            .get()
            .ok_or_else(|| anyhow!("speech model not initialized"))
    }

    fn run_inference(&self, audio: &DecodedAudio) -> Result<String> {
        let ctx = self.context()?;
        let mut state = ctx
            .create_state()
            .context("failed to create inference state")?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_no_context(true);
        params.set_translate(false);
        params.set_language(Some(self.language.as_str()));

        state
            .full(params, &audio.samples)
            .context("speech inference failed")?;

        let segment_count = state
            .full_n_segments()
            .context("failed to read segment count")?;

        let mut text = String::new();
        for i in 0..segment_count {
            let segment = state
                .full_get_segment_text(i)
                .with_context(|| format!("failed to read segment {}", i))?;
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment.trim());
        }

        debug!(
            "Inference produced {} segments, {} chars",
            segment_count,
            text.len()
        );

        Ok(text.trim().to_string())
    }
}

impl Transcribe for WhisperTranscriber {
    fn transcribe(&self, audio: &DecodedAudio) -> Transcript {
        match self.run_inference(audio) {
            Ok(text) if !text.is_empty() => Transcript {
                text,
                source: TranscriptSource::Ok,
            },
            Ok(_) => Transcript::fallback("model produced no text"),
            Err(e) => Transcript::fallback(format!("{:#}", e)),
        }
    }
}
