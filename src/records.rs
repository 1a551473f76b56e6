//! Persistence collaborator for completed pipeline outcomes
//!
//! The pipeline hands every Completed/Degraded outcome to an
//! `ObservationRepository` keyed by subject id. The relational store behind
//! this boundary is an external concern; the in-memory implementation here
//! backs the HTTP surface and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::pipeline::{PipelineOutcome, ProcessingStatus};

/// Stored behavioral record for one observation session
#[derive(Debug, Clone, Serialize)]
pub struct ObservationRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub transcript_text: String,
    pub processing_status: ProcessingStatus,
    pub analysis: AnalysisResult,
    pub created_at: DateTime<Utc>,
}

impl ObservationRecord {
    pub fn from_outcome(subject_id: &str, outcome: &PipelineOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            transcript_text: outcome.transcript.text.clone(),
            processing_status: outcome.processing_status,
            analysis: outcome.analysis.clone(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ObservationRepository: Send + Sync {
    async fn save_observation(&self, record: ObservationRecord);
    async fn observations_for(&self, subject_id: &str) -> Vec<ObservationRecord>;
}

/// In-memory repository (subject id -> records, newest last)
#[derive(Default)]
pub struct InMemoryObservationRepository {
    records: RwLock<HashMap<String, Vec<ObservationRecord>>>,
}

impl InMemoryObservationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObservationRepository for InMemoryObservationRepository {
    async fn save_observation(&self, record: ObservationRecord) {
        let mut records = self.records.write().await;
        records
            .entry(record.subject_id.clone())
            .or_default()
            .push(record);
    }

    async fn observations_for(&self, subject_id: &str) -> Vec<ObservationRecord> {
        let records = self.records.read().await;
        records.get(subject_id).cloned().unwrap_or_default()
    }
}
