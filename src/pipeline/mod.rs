pub mod orchestrator;

pub use orchestrator::{Diagnostics, PipelineOrchestrator, PipelineOutcome, ProcessingStatus};
