//! Round duration arithmetic.
//!
//! Each round type has its own formula:
//! - general / position: Σ(prepare_seconds + answer_minutes × 60) / 60
//! - coding: Σ duration_minutes
//! - aptitude: Σ question_count × per_question_minutes
//!
//! Malformed numeric inputs count as zero; nothing here returns an error.

use serde::Serialize;

use crate::models::lenient::sanitize;
use crate::models::question_set::{AptitudeQuestion, CodingQuestion, Question, Round, Rounds};

pub fn interview_round_minutes(questions: &[Question]) -> f64 {
    let seconds: f64 = questions
        .iter()
        .map(|q| sanitize(q.prepare_time_seconds) + sanitize(q.answer_time_minutes) * 60.0)
        .sum();
    seconds / 60.0
}

pub fn coding_round_minutes(questions: &[CodingQuestion]) -> f64 {
    questions.iter().map(|q| sanitize(q.duration_minutes)).sum()
}

pub fn aptitude_round_minutes(questions: &[AptitudeQuestion]) -> f64 {
    questions
        .iter()
        .map(|q| q.question_count as f64 * sanitize(q.per_question_time_minutes))
        .sum()
}

pub fn round_minutes(rounds: &Rounds, round: Round) -> f64 {
    match round {
        Round::General => interview_round_minutes(&rounds.general),
        Round::Position => interview_round_minutes(&rounds.position),
        Round::Coding => coding_round_minutes(&rounds.coding),
        Round::Aptitude => aptitude_round_minutes(&rounds.aptitude),
    }
}

/// Formats fractional minutes as `hh:mm:ss`, rounded to the nearest second.
pub fn format_hms(minutes: f64) -> String {
    let total_seconds = (sanitize(minutes) * 60.0).round() as u64;
    let hours = total_seconds / 3600;
    let mins = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{hours:02}:{mins:02}:{secs:02}")
}

/// Per-round counts and durations, computed in one pass over the rounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationSummary {
    /// Indexed by `Round::index()`.
    pub round_minutes: [f64; 4],
    pub round_counts: [usize; 4],
    pub total_minutes: f64,
    pub total_questions: usize,
}

impl DurationSummary {
    pub fn of(rounds: &Rounds) -> Self {
        let mut round_minutes = [0.0; 4];
        let mut round_counts = [0; 4];
        for round in Round::ALL {
            round_minutes[round.index()] = self::round_minutes(rounds, round);
            round_counts[round.index()] = rounds.count(round);
        }
        DurationSummary {
            round_minutes,
            round_counts,
            total_minutes: round_minutes.iter().sum(),
            total_questions: round_counts.iter().sum(),
        }
    }

    pub fn minutes(&self, round: Round) -> f64 {
        self.round_minutes[round.index()]
    }

    pub fn count(&self, round: Round) -> usize {
        self.round_counts[round.index()]
    }

    pub fn is_assigned(&self, round: Round) -> bool {
        self.count(round) > 0
    }

    pub fn allocated_time(&self, round: Round) -> String {
        format_hms(self.minutes(round))
    }

    pub fn allocated_times(&self) -> [String; 4] {
        Round::ALL.map(|round| self.allocated_time(round))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question_set::Difficulty;

    fn interview(prepare: f64, answer: f64) -> Question {
        Question {
            prepare_time_seconds: prepare,
            answer_time_minutes: answer,
            ..Default::default()
        }
    }

    fn coding(duration: f64) -> CodingQuestion {
        CodingQuestion {
            duration_minutes: duration,
            programming_language: "rust".to_string(),
            difficulty: Difficulty::Easy,
            ..Default::default()
        }
    }

    #[test]
    fn test_interview_rounds_total_example() {
        let rounds = Rounds {
            general: vec![interview(10.0, 2.0), interview(10.0, 2.0)],
            position: vec![interview(15.0, 1.0)],
            ..Default::default()
        };
        let summary = DurationSummary::of(&rounds);
        assert!((summary.total_minutes - 5.583_333_333).abs() < 1e-6);
        assert_eq!(summary.total_questions, 3);
    }

    #[test]
    fn test_coding_round_sums_durations() {
        assert_eq!(coding_round_minutes(&[coding(15.0), coding(30.0)]), 45.0);
    }

    #[test]
    fn test_aptitude_round_multiplies_count_by_time() {
        let q = AptitudeQuestion {
            topic: "Logical reasoning".to_string(),
            question_count: 5,
            per_question_time_minutes: 2.0,
            ..Default::default()
        };
        assert_eq!(aptitude_round_minutes(&[q]), 10.0);
    }

    #[test]
    fn test_malformed_values_count_as_zero() {
        let q = interview(f64::NAN, -3.0);
        assert_eq!(interview_round_minutes(&[q]), 0.0);
        assert_eq!(coding_round_minutes(&[coding(f64::INFINITY)]), 0.0);
    }

    #[test]
    fn test_empty_rounds_are_zero() {
        let summary = DurationSummary::of(&Rounds::default());
        assert_eq!(summary.total_minutes, 0.0);
        assert_eq!(summary.allocated_times(), ["00:00:00"; 4].map(String::from));
    }

    #[test]
    fn test_format_hms_rounds_to_nearest_second() {
        assert_eq!(format_hms(4.333_333_3), "00:04:20");
        assert_eq!(format_hms(1.25), "00:01:15");
        assert_eq!(format_hms(0.0083), "00:00:00");
        assert_eq!(format_hms(0.0092), "00:00:01");
        assert_eq!(format_hms(125.5), "02:05:30");
    }

    #[test]
    fn test_format_hms_treats_garbage_as_zero() {
        assert_eq!(format_hms(-5.0), "00:00:00");
        assert_eq!(format_hms(f64::NAN), "00:00:00");
    }

    #[test]
    fn test_assignment_follows_counts() {
        let rounds = Rounds {
            general: vec![interview(10.0, 2.0)],
            coding: vec![coding(20.0)],
            ..Default::default()
        };
        let summary = DurationSummary::of(&rounds);
        assert!(summary.is_assigned(Round::General));
        assert!(!summary.is_assigned(Round::Position));
        assert!(summary.is_assigned(Round::Coding));
        assert!(!summary.is_assigned(Round::Aptitude));
        assert_eq!(summary.allocated_time(Round::Coding), "00:20:00");
    }
}
