pub mod transcriber;

pub use transcriber::{
    Transcribe, Transcript, TranscriptSource, WhisperTranscriber, TRANSCRIPTION_ERROR_MARKER,
};
