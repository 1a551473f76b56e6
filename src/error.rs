use thiserror::Error;

/// Fatal, caller-visible pipeline failures.
///
/// Everything here aborts the invocation before a record is produced; the
/// recoverable conditions (transcription fallback, analysis fallback) never
/// appear as errors — they surface as a degraded outcome instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filename has no extension or the extension is outside the allow-list.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Upload exceeds the configured maximum size.
    #[error("audio file too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// Every decode strategy failed; carries the chained reasons.
    #[error("all decode strategies failed: {0}")]
    DecodeExhausted(String),

    /// Decoded audio is shorter than the configured minimum duration.
    #[error("audio too short: {actual:.2}s (minimum {min:.2}s)")]
    TooShort { actual: f64, min: f64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
