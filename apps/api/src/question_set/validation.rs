use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::question_set::Round;
use crate::question_set::draft::QuestionSetDraft;

/// Rounds that must hold at least one question before a draft can be saved.
/// Coding and aptitude are optional.
pub const MANDATORY_ROUNDS: [Round; 2] = [Round::General, Round::Position];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub round: Round,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Same rule in create and edit mode: general and position rounds are non-empty.
pub fn validate_draft(draft: &QuestionSetDraft) -> ValidationReport {
    let issues: Vec<ValidationIssue> = MANDATORY_ROUNDS
        .iter()
        .filter(|round| draft.rounds.count(**round) == 0)
        .map(|round| ValidationIssue {
            round: *round,
            message: format!("Add at least one question to the {round} round"),
        })
        .collect();

    ValidationReport {
        valid: issues.is_empty(),
        issues,
    }
}

pub fn is_valid(draft: &QuestionSetDraft) -> bool {
    MANDATORY_ROUNDS
        .iter()
        .all(|round| draft.rounds.count(*round) > 0)
}

/// Gate used by submit. The error message lists every empty mandatory round.
pub fn ensure_valid(draft: &QuestionSetDraft) -> Result<(), AppError> {
    if is_valid(draft) {
        return Ok(());
    }
    let report = validate_draft(draft);
    Err(AppError::Validation(
        report
            .issues
            .iter()
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question_set::{AptitudeQuestion, CodingQuestion, Question};
    use crate::question_set::draft::NewQuestion;
    use uuid::Uuid;

    fn q(text: &str) -> Question {
        Question {
            text: text.to_string(),
            prepare_time_seconds: 10.0,
            answer_time_minutes: 2.0,
            ..Default::default()
        }
    }

    fn draft_with_optional_rounds() -> QuestionSetDraft {
        let mut d = QuestionSetDraft::new(Uuid::new_v4(), Uuid::new_v4());
        for _ in 0..3 {
            d.add_question(NewQuestion::Coding(CodingQuestion {
                duration_minutes: 20.0,
                ..Default::default()
            }));
            d.add_question(NewQuestion::Aptitude(AptitudeQuestion {
                question_count: 5,
                per_question_time_minutes: 1.0,
                ..Default::default()
            }));
        }
        d
    }

    #[test]
    fn test_empty_draft_reports_both_mandatory_rounds() {
        let d = QuestionSetDraft::new(Uuid::new_v4(), Uuid::new_v4());
        let report = validate_draft(&d);
        assert!(!report.valid);
        let rounds: Vec<Round> = report.issues.iter().map(|i| i.round).collect();
        assert_eq!(rounds, vec![Round::General, Round::Position]);
    }

    #[test]
    fn test_optional_rounds_do_not_satisfy_the_gate() {
        let d = draft_with_optional_rounds();
        assert!(!is_valid(&d));
    }

    #[test]
    fn test_general_only_is_rejected() {
        let mut d = draft_with_optional_rounds();
        d.add_question(NewQuestion::General(q("Intro")));
        let report = validate_draft(&d);
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].round, Round::Position);
    }

    #[test]
    fn test_both_mandatory_rounds_filled_is_accepted() {
        let mut d = QuestionSetDraft::new(Uuid::new_v4(), Uuid::new_v4());
        d.add_question(NewQuestion::General(q("Intro")));
        d.add_question(NewQuestion::Position(q("System design")));
        assert!(is_valid(&d));
        assert!(ensure_valid(&d).is_ok());
    }

    #[test]
    fn test_edit_mode_uses_the_same_rule() {
        let mut d = QuestionSetDraft::new(Uuid::new_v4(), Uuid::new_v4());
        d.question_set_id = Some(Uuid::new_v4());
        d.add_question(NewQuestion::Position(q("System design")));
        let err = ensure_valid(&d).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("general")));
    }
}
