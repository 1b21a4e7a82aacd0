//! Documents written alongside the aggregate: the per-round section document
//! and the instruction document. Both are keyed by question-set id and are
//! what the candidate-facing runtime reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question_set::{
    AptitudeQuestion, CodingQuestion, Question, QuestionSet, Round,
};
use crate::question_set::duration::{format_hms, DurationSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSection<T> {
    pub round: Round,
    pub round_number: usize,
    pub assigned: bool,
    pub question_count: usize,
    /// `hh:mm:ss`
    pub allocated_time: String,
    pub shuffle: bool,
    pub questions: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDocument {
    pub question_set_id: Uuid,
    pub organization_id: Uuid,
    pub position_id: Uuid,
    pub general: RoundSection<Question>,
    pub position: RoundSection<Question>,
    pub coding: RoundSection<CodingQuestion>,
    pub aptitude: RoundSection<AptitudeQuestion>,
    pub total_questions: usize,
    pub total_allocated_time: String,
    pub generated_at: DateTime<Utc>,
}

impl SectionDocument {
    pub fn build(set: &QuestionSet) -> Self {
        let summary = DurationSummary::of(&set.rounds);

        SectionDocument {
            question_set_id: set.id,
            organization_id: set.organization_id,
            position_id: set.position_id,
            general: round_section(set, &summary, Round::General, &set.rounds.general),
            position: round_section(set, &summary, Round::Position, &set.rounds.position),
            coding: round_section(set, &summary, Round::Coding, &set.rounds.coding),
            aptitude: round_section(set, &summary, Round::Aptitude, &set.rounds.aptitude),
            total_questions: summary.total_questions,
            total_allocated_time: format_hms(summary.total_minutes),
            generated_at: Utc::now(),
        }
    }
}

fn round_section<T: Clone>(
    set: &QuestionSet,
    summary: &DurationSummary,
    round: Round,
    questions: &[T],
) -> RoundSection<T> {
    RoundSection {
        round,
        round_number: round.number(),
        assigned: summary.is_assigned(round),
        question_count: summary.count(round),
        allocated_time: summary.allocated_time(round),
        shuffle: set.shuffle.get(round),
        questions: questions.to_vec(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionDocument {
    pub question_set_id: Uuid,
    pub position_id: Uuid,
    pub instruction_text: String,
    pub updated_at: DateTime<Utc>,
}

impl InstructionDocument {
    pub fn build(set: &QuestionSet) -> Self {
        InstructionDocument {
            question_set_id: set.id,
            position_id: set.position_id,
            instruction_text: set.instruction_text.clone(),
            updated_at: Utc::now(),
        }
    }
}
