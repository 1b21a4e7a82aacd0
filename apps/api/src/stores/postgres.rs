//! Postgres-backed stores: question sets, instructions, assessment state,
//! candidate bindings and position profiles.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::to_value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{
    AssessmentStateStore, CandidateLookup, InstructionStore, PositionLookup, QuestionSetStore,
};
use crate::models::assessment::{AssessmentAssignment, AssessmentKey, AssessmentState};
use crate::models::position::{CandidateRef, PositionProfile};
use crate::models::question_set::{QuestionSet, QuestionSetRow};
use crate::question_set::documents::InstructionDocument;

#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionSetStore for PgStores {
    async fn create(&self, set: &QuestionSet) -> Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO question_sets
                (id, organization_id, position_id, code, interview_platform, interview_mode,
                 shuffle, instruction_text, rounds, total_questions, total_duration_minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(set.id)
        .bind(set.organization_id)
        .bind(set.position_id)
        .bind(&set.code)
        .bind(set.interview_platform.as_str())
        .bind(set.interview_mode.as_str())
        .bind(to_value(set.shuffle)?)
        .bind(&set.instruction_text)
        .bind(to_value(&set.rounds)?)
        .bind(set.total_questions as i32)
        .bind(set.total_duration_minutes)
        .execute(&self.pool)
        .await?;

        debug!("Inserted question set {} ({})", set.id, set.code);
        Ok(set.id)
    }

    async fn update(&self, set: &QuestionSet) -> Result<Uuid> {
        let result = sqlx::query(
            r#"
            UPDATE question_sets
            SET interview_platform = $2, interview_mode = $3, shuffle = $4,
                instruction_text = $5, rounds = $6, total_questions = $7,
                total_duration_minutes = $8, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(set.id)
        .bind(set.interview_platform.as_str())
        .bind(set.interview_mode.as_str())
        .bind(to_value(set.shuffle)?)
        .bind(&set.instruction_text)
        .bind(to_value(&set.rounds)?)
        .bind(set.total_questions as i32)
        .bind(set.total_duration_minutes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("question set {} does not exist", set.id));
        }
        debug!("Updated question set {}", set.id);
        Ok(set.id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<QuestionSet>> {
        let row: Option<QuestionSetRow> =
            sqlx::query_as("SELECT * FROM question_sets WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(QuestionSet::try_from).transpose()
    }
}

#[async_trait]
impl InstructionStore for PgStores {
    async fn create(&self, doc: &InstructionDocument) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO question_set_instructions
                (question_set_id, position_id, instruction_text, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(doc.question_set_id)
        .bind(doc.position_id)
        .bind(&doc.instruction_text)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Older question sets may predate the instructions table, so an edit
    /// inserts the row when it is missing.
    async fn update(&self, doc: &InstructionDocument) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO question_set_instructions
                (question_set_id, position_id, instruction_text, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (question_set_id) DO UPDATE
            SET instruction_text = EXCLUDED.instruction_text,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(doc.question_set_id)
        .bind(doc.position_id)
        .bind(&doc.instruction_text)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, question_set_id: Uuid) -> Result<Option<InstructionDocument>> {
        let row: Option<(Uuid, Uuid, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            r#"
            SELECT question_set_id, position_id, instruction_text, updated_at
            FROM question_set_instructions
            WHERE question_set_id = $1
            "#,
        )
        .bind(question_set_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(question_set_id, position_id, instruction_text, updated_at)| InstructionDocument {
                question_set_id,
                position_id,
                instruction_text,
                updated_at,
            },
        ))
    }
}

#[async_trait]
impl AssessmentStateStore for PgStores {
    async fn upsert(&self, a: &AssessmentAssignment) -> Result<AssessmentState> {
        // Completion flags and report status are owned by the interview runtime
        // and stay out of the DO UPDATE list.
        let state = sqlx::query_as::<_, AssessmentState>(
            r#"
            INSERT INTO assessment_states
                (id, candidate_id, position_id, question_set_id,
                 round1_assigned, round2_assigned, round3_assigned, round4_assigned,
                 round1_allocated_time, round2_allocated_time,
                 round3_allocated_time, round4_allocated_time,
                 total_interview_time_minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (candidate_id, position_id, question_set_id) DO UPDATE
            SET round1_assigned = EXCLUDED.round1_assigned,
                round2_assigned = EXCLUDED.round2_assigned,
                round3_assigned = EXCLUDED.round3_assigned,
                round4_assigned = EXCLUDED.round4_assigned,
                round1_allocated_time = EXCLUDED.round1_allocated_time,
                round2_allocated_time = EXCLUDED.round2_allocated_time,
                round3_allocated_time = EXCLUDED.round3_allocated_time,
                round4_allocated_time = EXCLUDED.round4_allocated_time,
                total_interview_time_minutes = EXCLUDED.total_interview_time_minutes,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(a.key.candidate_id)
        .bind(a.key.position_id)
        .bind(a.key.question_set_id)
        .bind(a.assigned[0])
        .bind(a.assigned[1])
        .bind(a.assigned[2])
        .bind(a.assigned[3])
        .bind(&a.allocated_time[0])
        .bind(&a.allocated_time[1])
        .bind(&a.allocated_time[2])
        .bind(&a.allocated_time[3])
        .bind(a.total_interview_time_minutes)
        .fetch_one(&self.pool)
        .await?;

        Ok(state)
    }

    async fn get(&self, key: &AssessmentKey) -> Result<Option<AssessmentState>> {
        Ok(sqlx::query_as::<_, AssessmentState>(
            r#"
            SELECT * FROM assessment_states
            WHERE candidate_id = $1 AND position_id = $2 AND question_set_id = $3
            "#,
        )
        .bind(key.candidate_id)
        .bind(key.position_id)
        .bind(key.question_set_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[async_trait]
impl CandidateLookup for PgStores {
    async fn bound_candidates(
        &self,
        organization_id: Uuid,
        position_id: Uuid,
    ) -> Result<Vec<CandidateRef>> {
        Ok(sqlx::query_as::<_, CandidateRef>(
            r#"
            SELECT c.id, c.full_name, c.email
            FROM candidate_positions cp
            JOIN candidates c ON c.id = cp.candidate_id
            WHERE cp.organization_id = $1 AND cp.position_id = $2 AND cp.is_active
            ORDER BY c.full_name
            "#,
        )
        .bind(organization_id)
        .bind(position_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl PositionLookup for PgStores {
    async fn position(&self, position_id: Uuid) -> Result<Option<PositionProfile>> {
        Ok(sqlx::query_as::<_, PositionProfile>(
            r#"
            SELECT id, title, domain, min_experience, max_experience,
                   mandatory_skills, optional_skills
            FROM positions
            WHERE id = $1
            "#,
        )
        .bind(position_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
