use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::lenient::{f64_or_zero, u32_or_zero};

// ────────────────────────────────────────────────────────────────────────────
// Rounds
// ────────────────────────────────────────────────────────────────────────────

/// The four fixed interview rounds, in the order the candidate runtime presents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    General,
    Position,
    Coding,
    Aptitude,
}

impl Round {
    pub const ALL: [Round; 4] = [Round::General, Round::Position, Round::Coding, Round::Aptitude];

    /// 1-based round number used by assessment-state columns (`round1_*` … `round4_*`).
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn index(self) -> usize {
        match self {
            Round::General => 0,
            Round::Position => 1,
            Round::Coding => 2,
            Round::Aptitude => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Round::General => "general",
            Round::Position => "position",
            Round::Coding => "coding",
            Round::Aptitude => "aptitude",
        }
    }

    /// General and position rounds hold spoken-answer questions with prepare/answer timing.
    pub fn is_interview(self) -> bool {
        matches!(self, Round::General | Round::Position)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Manual,
    Ai,
    Library,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

// ────────────────────────────────────────────────────────────────────────────
// Question types
// ────────────────────────────────────────────────────────────────────────────

/// A general or position-specific question answered verbally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub prepare_time_seconds: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub answer_time_minutes: f64,
    #[serde(default)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodingQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Library-sourced coding problems may be referenced by source only.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub programming_language: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub duration_minutes: f64,
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AptitudeQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, deserialize_with = "u32_or_zero")]
    pub question_count: u32,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub per_question_time_minutes: f64,
}

fn default_source() -> String {
    "manual".to_string()
}

/// Identity of a question inside one round: its id, or its text while it has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKey {
    Id(Uuid),
    Text(String),
}

impl QuestionKey {
    pub fn matches<Q: RoundItem>(&self, item: &Q) -> bool {
        match (self, item.id()) {
            (QuestionKey::Id(key), Some(id)) => *key == id,
            (QuestionKey::Text(text), None) => item.key_text() == text,
            _ => false,
        }
    }

    pub fn of<Q: RoundItem>(item: &Q) -> Self {
        match item.id() {
            Some(id) => QuestionKey::Id(id),
            None => QuestionKey::Text(item.key_text().to_string()),
        }
    }
}

/// Common view over the three question shapes so the draft can locate,
/// remove and stamp ids on entries of any round.
pub trait RoundItem {
    fn id(&self) -> Option<Uuid>;
    fn set_id(&mut self, id: Uuid);
    fn key_text(&self) -> &str;
}

impl RoundItem for Question {
    fn id(&self) -> Option<Uuid> {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
    fn key_text(&self) -> &str {
        &self.text
    }
}

impl RoundItem for CodingQuestion {
    fn id(&self) -> Option<Uuid> {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
    fn key_text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

impl RoundItem for AptitudeQuestion {
    fn id(&self) -> Option<Uuid> {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
    fn key_text(&self) -> &str {
        &self.topic
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregate
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rounds {
    #[serde(default)]
    pub general: Vec<Question>,
    #[serde(default)]
    pub position: Vec<Question>,
    #[serde(default)]
    pub coding: Vec<CodingQuestion>,
    #[serde(default)]
    pub aptitude: Vec<AptitudeQuestion>,
}

impl Rounds {
    pub fn count(&self, round: Round) -> usize {
        match round {
            Round::General => self.general.len(),
            Round::Position => self.position.len(),
            Round::Coding => self.coding.len(),
            Round::Aptitude => self.aptitude.len(),
        }
    }

    /// Mutable access to an interview round. `None` for coding/aptitude.
    pub fn interview_mut(&mut self, round: Round) -> Option<&mut Vec<Question>> {
        match round {
            Round::General => Some(&mut self.general),
            Round::Position => Some(&mut self.position),
            Round::Coding | Round::Aptitude => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleFlags {
    #[serde(default)]
    pub general: bool,
    #[serde(default)]
    pub position: bool,
    #[serde(default)]
    pub coding: bool,
    #[serde(default)]
    pub aptitude: bool,
}

impl ShuffleFlags {
    pub fn get(&self, round: Round) -> bool {
        match round {
            Round::General => self.general,
            Round::Position => self.position,
            Round::Coding => self.coding,
            Round::Aptitude => self.aptitude,
        }
    }

    pub fn set(&mut self, round: Round, value: bool) {
        match round {
            Round::General => self.general = value,
            Round::Position => self.position = value,
            Round::Coding => self.coding = value,
            Round::Aptitude => self.aptitude = value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPlatform {
    #[default]
    Web,
    Desktop,
    Mobile,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewMode {
    #[default]
    Video,
    Audio,
    Text,
}

impl InterviewPlatform {
    pub fn as_str(self) -> &'static str {
        match self {
            InterviewPlatform::Web => "web",
            InterviewPlatform::Desktop => "desktop",
            InterviewPlatform::Mobile => "mobile",
        }
    }
}

impl FromStr for InterviewPlatform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(InterviewPlatform::Web),
            "desktop" => Ok(InterviewPlatform::Desktop),
            "mobile" => Ok(InterviewPlatform::Mobile),
            other => Err(anyhow::anyhow!("unknown interview platform '{other}'")),
        }
    }
}

impl InterviewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InterviewMode::Video => "video",
            InterviewMode::Audio => "audio",
            InterviewMode::Text => "text",
        }
    }
}

impl FromStr for InterviewMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(InterviewMode::Video),
            "audio" => Ok(InterviewMode::Audio),
            "text" => Ok(InterviewMode::Text),
            other => Err(anyhow::anyhow!("unknown interview mode '{other}'")),
        }
    }
}

/// The persisted question set. `total_questions` and `total_duration_minutes`
/// are always derived from `rounds` at assembly time, never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub position_id: Uuid,
    pub code: String,
    pub interview_platform: InterviewPlatform,
    pub interview_mode: InterviewMode,
    pub shuffle: ShuffleFlags,
    pub instruction_text: String,
    pub rounds: Rounds,
    pub total_questions: u32,
    pub total_duration_minutes: f64,
}

/// Row shape of `question_sets`. Rounds and shuffle flags live in JSONB columns.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionSetRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub position_id: Uuid,
    pub code: String,
    pub interview_platform: String,
    pub interview_mode: String,
    pub shuffle: Value,
    pub instruction_text: String,
    pub rounds: Value,
    pub total_questions: i32,
    pub total_duration_minutes: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<QuestionSetRow> for QuestionSet {
    type Error = anyhow::Error;

    fn try_from(row: QuestionSetRow) -> Result<Self, Self::Error> {
        Ok(QuestionSet {
            id: row.id,
            organization_id: row.organization_id,
            position_id: row.position_id,
            code: row.code,
            interview_platform: row.interview_platform.parse()?,
            interview_mode: row.interview_mode.parse()?,
            shuffle: serde_json::from_value(row.shuffle)?,
            instruction_text: row.instruction_text,
            rounds: serde_json::from_value(row.rounds)?,
            total_questions: row.total_questions.max(0) as u32,
            total_duration_minutes: row.total_duration_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_numbers_follow_presentation_order() {
        let numbers: Vec<usize> = Round::ALL.iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_question_key_prefers_id() {
        let id = Uuid::new_v4();
        let q = Question {
            id: Some(id),
            text: "Tell me about yourself".to_string(),
            ..Default::default()
        };
        assert!(QuestionKey::Id(id).matches(&q));
        assert!(!QuestionKey::Text("Tell me about yourself".to_string()).matches(&q));
        assert_eq!(QuestionKey::of(&q), QuestionKey::Id(id));
    }

    #[test]
    fn test_question_key_falls_back_to_text_without_id() {
        let q = Question {
            text: "Why this company?".to_string(),
            provenance: Provenance::Library,
            ..Default::default()
        };
        assert!(QuestionKey::Text("Why this company?".to_string()).matches(&q));
        assert!(!QuestionKey::Id(Uuid::new_v4()).matches(&q));
    }

    #[test]
    fn test_coding_question_defaults_source_to_manual() {
        let q: CodingQuestion =
            serde_json::from_str(r#"{"programming_language": "rust", "duration_minutes": "15"}"#)
                .unwrap();
        assert_eq!(q.source, "manual");
        assert_eq!(q.duration_minutes, 15.0);
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert!(q.text.is_none());
    }

    #[test]
    fn test_question_key_serde_shape() {
        let key: QuestionKey = serde_json::from_str(r#"{"text": "abc"}"#).unwrap();
        assert_eq!(key, QuestionKey::Text("abc".to_string()));
    }

    #[test]
    fn test_platform_and_mode_parse_round_trip() {
        for p in [InterviewPlatform::Web, InterviewPlatform::Desktop, InterviewPlatform::Mobile] {
            assert_eq!(p.as_str().parse::<InterviewPlatform>().unwrap(), p);
        }
        assert!("kiosk".parse::<InterviewMode>().is_err());
    }

    #[test]
    fn test_shuffle_flags_set_and_get() {
        let mut flags = ShuffleFlags::default();
        flags.set(Round::Coding, true);
        assert!(flags.get(Round::Coding));
        assert!(!flags.get(Round::General));
    }
}
