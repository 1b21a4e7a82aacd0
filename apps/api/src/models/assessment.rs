use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Natural key of an assessment-state row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssessmentKey {
    pub candidate_id: Uuid,
    pub position_id: Uuid,
    pub question_set_id: Uuid,
}

/// Per candidate × position × question-set progress, read by the interview runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AssessmentState {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub position_id: Uuid,
    pub question_set_id: Uuid,
    pub round1_assigned: bool,
    pub round2_assigned: bool,
    pub round3_assigned: bool,
    pub round4_assigned: bool,
    pub round1_completed: bool,
    pub round2_completed: bool,
    pub round3_completed: bool,
    pub round4_completed: bool,
    /// `hh:mm:ss`
    pub round1_allocated_time: String,
    pub round2_allocated_time: String,
    pub round3_allocated_time: String,
    pub round4_allocated_time: String,
    pub total_interview_time_minutes: f64,
    pub is_assessment_completed: bool,
    pub is_report_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
impl AssessmentState {
    pub fn assigned(&self) -> [bool; 4] {
        [
            self.round1_assigned,
            self.round2_assigned,
            self.round3_assigned,
            self.round4_assigned,
        ]
    }
}

/// The slice of an assessment state written by a question-set save.
///
/// Completion flags and report status belong to the interview runtime and are
/// never touched by the fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentAssignment {
    pub key: AssessmentKey,
    /// Indexed by round (general, position, coding, aptitude).
    pub assigned: [bool; 4],
    pub allocated_time: [String; 4],
    pub total_interview_time_minutes: f64,
}

/// In-memory counterpart of the Postgres upsert, used by the test backend.
#[cfg(test)]
impl AssessmentAssignment {
    /// Overwrites the assignment columns of an existing state.
    pub fn apply_to(&self, state: &mut AssessmentState) {
        state.round1_assigned = self.assigned[0];
        state.round2_assigned = self.assigned[1];
        state.round3_assigned = self.assigned[2];
        state.round4_assigned = self.assigned[3];
        state.round1_allocated_time = self.allocated_time[0].clone();
        state.round2_allocated_time = self.allocated_time[1].clone();
        state.round3_allocated_time = self.allocated_time[2].clone();
        state.round4_allocated_time = self.allocated_time[3].clone();
        state.total_interview_time_minutes = self.total_interview_time_minutes;
        state.updated_at = Utc::now();
    }

    /// A fresh state for a candidate that has none yet.
    pub fn to_new_state(&self) -> AssessmentState {
        let now = Utc::now();
        let mut state = AssessmentState {
            id: Uuid::new_v4(),
            candidate_id: self.key.candidate_id,
            position_id: self.key.position_id,
            question_set_id: self.key.question_set_id,
            round1_assigned: false,
            round2_assigned: false,
            round3_assigned: false,
            round4_assigned: false,
            round1_completed: false,
            round2_completed: false,
            round3_completed: false,
            round4_completed: false,
            round1_allocated_time: String::new(),
            round2_allocated_time: String::new(),
            round3_allocated_time: String::new(),
            round4_allocated_time: String::new(),
            total_interview_time_minutes: 0.0,
            is_assessment_completed: false,
            is_report_generated: false,
            created_at: now,
            updated_at: now,
        };
        self.apply_to(&mut state);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment() -> AssessmentAssignment {
        AssessmentAssignment {
            key: AssessmentKey {
                candidate_id: Uuid::new_v4(),
                position_id: Uuid::new_v4(),
                question_set_id: Uuid::new_v4(),
            },
            assigned: [true, true, false, false],
            allocated_time: [
                "00:04:20".to_string(),
                "00:01:15".to_string(),
                "00:00:00".to_string(),
                "00:00:00".to_string(),
            ],
            total_interview_time_minutes: 5.583,
        }
    }

    #[test]
    fn test_new_state_carries_assignment() {
        let a = assignment();
        let state = a.to_new_state();
        assert_eq!(state.candidate_id, a.key.candidate_id);
        assert_eq!(state.question_set_id, a.key.question_set_id);
        assert_eq!(state.assigned(), [true, true, false, false]);
        assert_eq!(state.round1_allocated_time, "00:04:20");
        assert!(!state.is_assessment_completed);
    }

    #[test]
    fn test_apply_preserves_completion_flags() {
        let a = assignment();
        let mut state = a.to_new_state();
        state.round1_completed = true;
        state.is_report_generated = true;

        let mut update = a.clone();
        update.assigned = [true, true, true, false];
        update.allocated_time[2] = "00:45:00".to_string();
        update.apply_to(&mut state);

        assert!(state.round1_completed);
        assert!(state.is_report_generated);
        assert!(state.round3_assigned);
        assert_eq!(state.round3_allocated_time, "00:45:00");
    }
}
