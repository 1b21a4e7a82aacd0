//! Storage seams used by the question-set engine.
//!
//! Each collaborator is a trait object so the orchestrator never knows
//! whether it writes to Postgres, S3 or an in-memory test double.

pub mod postgres;
pub mod s3;

#[cfg(test)]
pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::assessment::{AssessmentAssignment, AssessmentKey, AssessmentState};
use crate::models::position::{CandidateRef, PositionProfile};
use crate::models::question_set::QuestionSet;
use crate::question_set::documents::{InstructionDocument, SectionDocument};

#[async_trait]
pub trait QuestionSetStore: Send + Sync {
    /// Inserts a new aggregate and returns its id.
    async fn create(&self, set: &QuestionSet) -> Result<Uuid>;
    /// Replaces an existing aggregate. Fails if it does not exist.
    async fn update(&self, set: &QuestionSet) -> Result<Uuid>;
    async fn get(&self, id: Uuid) -> Result<Option<QuestionSet>>;
}

#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn create(&self, doc: &SectionDocument) -> Result<()>;
    async fn update(&self, doc: &SectionDocument) -> Result<()>;
    async fn get(&self, question_set_id: Uuid) -> Result<Option<SectionDocument>>;
}

#[async_trait]
pub trait InstructionStore: Send + Sync {
    async fn create(&self, doc: &InstructionDocument) -> Result<()>;
    async fn update(&self, doc: &InstructionDocument) -> Result<()>;
    async fn get(&self, question_set_id: Uuid) -> Result<Option<InstructionDocument>>;
}

#[async_trait]
pub trait AssessmentStateStore: Send + Sync {
    /// Idempotent on (candidate, position, question set). Only the assignment
    /// columns are written; completion state is left alone.
    async fn upsert(&self, assignment: &AssessmentAssignment) -> Result<AssessmentState>;
    async fn get(&self, key: &AssessmentKey) -> Result<Option<AssessmentState>>;
}

#[async_trait]
pub trait CandidateLookup: Send + Sync {
    async fn bound_candidates(
        &self,
        organization_id: Uuid,
        position_id: Uuid,
    ) -> Result<Vec<CandidateRef>>;
}

#[async_trait]
pub trait PositionLookup: Send + Sync {
    async fn position(&self, position_id: Uuid) -> Result<Option<PositionProfile>>;
}

/// All storage collaborators, carried in `AppState`.
#[derive(Clone)]
pub struct Stores {
    pub question_sets: Arc<dyn QuestionSetStore>,
    pub sections: Arc<dyn SectionStore>,
    pub instructions: Arc<dyn InstructionStore>,
    pub assessments: Arc<dyn AssessmentStateStore>,
    pub candidates: Arc<dyn CandidateLookup>,
    pub positions: Arc<dyn PositionLookup>,
}
