pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod records;
pub mod speech;

pub use analysis::{Analyze, AnalysisResult, ChatAnalyzer};
pub use audio::{AudioAsset, AudioAssetStore, AudioDecoder, DecodedAudio, TARGET_SAMPLE_RATE};
pub use config::Config;
pub use error::PipelineError;
pub use http::{create_router, AppState};
pub use pipeline::{PipelineOrchestrator, PipelineOutcome, ProcessingStatus};
pub use records::{InMemoryObservationRepository, ObservationRecord, ObservationRepository};
pub use speech::{Transcribe, Transcript, TranscriptSource, WhisperTranscriber};
