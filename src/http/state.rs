use std::sync::Arc;

use crate::pipeline::PipelineOrchestrator;
use crate::records::ObservationRepository;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub repository: Arc<dyn ObservationRepository>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<PipelineOrchestrator>,
        repository: Arc<dyn ObservationRepository>,
    ) -> Self {
        Self {
            orchestrator,
            repository,
        }
    }
}
