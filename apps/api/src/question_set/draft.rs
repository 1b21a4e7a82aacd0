//! QuestionSetDraft: the in-memory aggregate edited by one session.
//!
//! All mutations are synchronous and local. Totals are never stored: they are
//! recomputed from the rounds every time they are read.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::lenient::{f64_or_zero, u32_or_zero};
use crate::models::question_set::{
    AptitudeQuestion, CodingQuestion, Difficulty, InterviewMode, InterviewPlatform, Provenance,
    Question, QuestionKey, QuestionSet, Round, RoundItem, Rounds, ShuffleFlags,
};
use crate::question_set::duration::DurationSummary;

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("No question {key:?} in the {round} round")]
    UnknownQuestion { round: Round, key: QuestionKey },

    #[error("Field '{field}' does not apply to the {round} round")]
    FieldNotApplicable { field: &'static str, round: Round },

    #[error("The {round} round does not accept this kind of question")]
    RoundMismatch { round: Round },

    #[error("Library preview item {index} is not available")]
    PreviewUnavailable { index: usize },
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::UnknownQuestion { .. } | DraftError::PreviewUnavailable { .. } => {
                AppError::NotFound(err.to_string())
            }
            DraftError::FieldNotApplicable { .. } | DraftError::RoundMismatch { .. } => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mutation payloads
// ────────────────────────────────────────────────────────────────────────────

/// A question to append, tagged with the round it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "round", content = "question", rename_all = "snake_case")]
pub enum NewQuestion {
    General(Question),
    Position(Question),
    Coding(CodingQuestion),
    Aptitude(AptitudeQuestion),
}

impl NewQuestion {
    pub fn round(&self) -> Round {
        match self {
            NewQuestion::General(_) => Round::General,
            NewQuestion::Position(_) => Round::Position,
            NewQuestion::Coding(_) => Round::Coding,
            NewQuestion::Aptitude(_) => Round::Aptitude,
        }
    }
}

/// A single-field edit. Numeric values go through the lenient deserializers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    Text(String),
    PrepareTimeSeconds(#[serde(deserialize_with = "f64_or_zero")] f64),
    AnswerTimeMinutes(#[serde(deserialize_with = "f64_or_zero")] f64),
    ProgrammingLanguage(String),
    Difficulty(Difficulty),
    DurationMinutes(#[serde(deserialize_with = "f64_or_zero")] f64),
    Source(String),
    Topic(String),
    QuestionCount(#[serde(deserialize_with = "u32_or_zero")] u32),
    PerQuestionTimeMinutes(#[serde(deserialize_with = "f64_or_zero")] f64),
}

impl FieldUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            FieldUpdate::Text(_) => "text",
            FieldUpdate::PrepareTimeSeconds(_) => "prepare_time_seconds",
            FieldUpdate::AnswerTimeMinutes(_) => "answer_time_minutes",
            FieldUpdate::ProgrammingLanguage(_) => "programming_language",
            FieldUpdate::Difficulty(_) => "difficulty",
            FieldUpdate::DurationMinutes(_) => "duration_minutes",
            FieldUpdate::Source(_) => "source",
            FieldUpdate::Topic(_) => "topic",
            FieldUpdate::QuestionCount(_) => "question_count",
            FieldUpdate::PerQuestionTimeMinutes(_) => "per_question_time_minutes",
        }
    }
}

/// Values of the "add new" control for an interview round; used for
/// generated and library-promoted questions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionDefaults {
    #[serde(deserialize_with = "f64_or_zero")]
    pub prepare_time_seconds: f64,
    #[serde(deserialize_with = "f64_or_zero")]
    pub answer_time_minutes: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Draft
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSetDraft {
    /// Set when editing an existing question set; submit then updates instead of creating.
    pub question_set_id: Option<Uuid>,
    pub organization_id: Uuid,
    pub position_id: Uuid,
    pub code: Option<String>,
    pub interview_platform: InterviewPlatform,
    pub interview_mode: InterviewMode,
    pub shuffle: ShuffleFlags,
    pub instruction_text: String,
    pub rounds: Rounds,
}

impl QuestionSetDraft {
    pub fn new(organization_id: Uuid, position_id: Uuid) -> Self {
        Self {
            question_set_id: None,
            organization_id,
            position_id,
            code: None,
            interview_platform: InterviewPlatform::default(),
            interview_mode: InterviewMode::default(),
            shuffle: ShuffleFlags::default(),
            instruction_text: String::new(),
            rounds: Rounds::default(),
        }
    }

    /// Opens an existing question set for editing.
    pub fn from_question_set(set: &QuestionSet) -> Self {
        Self {
            question_set_id: Some(set.id),
            organization_id: set.organization_id,
            position_id: set.position_id,
            code: Some(set.code.clone()),
            interview_platform: set.interview_platform,
            interview_mode: set.interview_mode,
            shuffle: set.shuffle,
            instruction_text: set.instruction_text.clone(),
            rounds: set.rounds.clone(),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.question_set_id.is_some()
    }

    /// Appends a manually entered question. Questions without an id get one.
    pub fn add_question(&mut self, payload: NewQuestion) -> QuestionKey {
        match payload {
            NewQuestion::General(q) => push_with_id(&mut self.rounds.general, q),
            NewQuestion::Position(q) => push_with_id(&mut self.rounds.position, q),
            NewQuestion::Coding(q) => push_with_id(&mut self.rounds.coding, q),
            NewQuestion::Aptitude(q) => push_with_id(&mut self.rounds.aptitude, q),
        }
    }

    pub fn update_question_field(
        &mut self,
        round: Round,
        key: &QuestionKey,
        update: FieldUpdate,
    ) -> Result<(), DraftError> {
        let not_applicable = DraftError::FieldNotApplicable {
            field: update.name(),
            round,
        };
        match round {
            Round::General | Round::Position => {
                let items = match round {
                    Round::General => &mut self.rounds.general,
                    _ => &mut self.rounds.position,
                };
                let q = find_mut(items, round, key)?;
                match update {
                    FieldUpdate::Text(text) => q.text = text,
                    FieldUpdate::PrepareTimeSeconds(v) => q.prepare_time_seconds = v,
                    FieldUpdate::AnswerTimeMinutes(v) => q.answer_time_minutes = v,
                    _ => return Err(not_applicable),
                }
            }
            Round::Coding => {
                let q = find_mut(&mut self.rounds.coding, round, key)?;
                match update {
                    FieldUpdate::Text(text) => q.text = Some(text),
                    FieldUpdate::ProgrammingLanguage(lang) => q.programming_language = lang,
                    FieldUpdate::Difficulty(d) => q.difficulty = d,
                    FieldUpdate::DurationMinutes(v) => q.duration_minutes = v,
                    FieldUpdate::Source(source) => q.source = source,
                    _ => return Err(not_applicable),
                }
            }
            Round::Aptitude => {
                let q = find_mut(&mut self.rounds.aptitude, round, key)?;
                match update {
                    FieldUpdate::Topic(topic) => q.topic = topic,
                    FieldUpdate::Difficulty(d) => q.difficulty = d,
                    FieldUpdate::QuestionCount(n) => q.question_count = n,
                    FieldUpdate::PerQuestionTimeMinutes(v) => q.per_question_time_minutes = v,
                    _ => return Err(not_applicable),
                }
            }
        }
        Ok(())
    }

    pub fn remove_question(&mut self, round: Round, key: &QuestionKey) -> Result<(), DraftError> {
        let removed = match round {
            Round::General => remove_by_key(&mut self.rounds.general, key),
            Round::Position => remove_by_key(&mut self.rounds.position, key),
            Round::Coding => remove_by_key(&mut self.rounds.coding, key),
            Round::Aptitude => remove_by_key(&mut self.rounds.aptitude, key),
        };
        if removed {
            Ok(())
        } else {
            Err(DraftError::UnknownQuestion {
                round,
                key: key.clone(),
            })
        }
    }

    pub fn set_shuffle(&mut self, round: Round, shuffle: bool) {
        self.shuffle.set(round, shuffle);
    }

    pub fn summary(&self) -> DurationSummary {
        DurationSummary::of(&self.rounds)
    }

    pub fn total_questions(&self) -> usize {
        Round::ALL.iter().map(|r| self.rounds.count(*r)).sum()
    }

    /// Minutes across all four rounds, recomputed from current contents.
    pub fn total_duration(&self) -> f64 {
        self.summary().total_minutes
    }

    /// Every non-empty question text in every round. Sent to the generation
    /// service so it can avoid repeats.
    pub fn all_texts(&self) -> Vec<String> {
        let interview = self
            .rounds
            .general
            .iter()
            .chain(self.rounds.position.iter())
            .map(|q| q.text.as_str());
        let coding = self.rounds.coding.iter().filter_map(|q| q.text.as_deref());
        interview
            .chain(coding)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn contains_text(&self, text: &str) -> bool {
        let text = text.trim();
        self.all_texts().iter().any(|t| t == text)
    }

    // ── generation support ─────────────────────────────────────────────────

    /// Appends an empty AI question that a reveal will fill in. It gets an id
    /// right away so the reveal can find it after concurrent edits.
    pub fn insert_generated(
        &mut self,
        round: Round,
        defaults: QuestionDefaults,
    ) -> Result<Uuid, DraftError> {
        let items = self
            .rounds
            .interview_mut(round)
            .ok_or(DraftError::RoundMismatch { round })?;
        let id = Uuid::new_v4();
        items.push(Question {
            id: Some(id),
            text: String::new(),
            prepare_time_seconds: defaults.prepare_time_seconds,
            answer_time_minutes: defaults.answer_time_minutes,
            provenance: Provenance::Ai,
        });
        Ok(id)
    }

    /// Appends revealed characters. Returns false once the question is gone.
    pub fn append_text(&mut self, round: Round, id: Uuid, chunk: &str) -> bool {
        let Some(items) = self.rounds.interview_mut(round) else {
            return false;
        };
        match items.iter_mut().find(|q| q.id == Some(id)) {
            Some(q) => {
                q.text.push_str(chunk);
                true
            }
            None => false,
        }
    }

    pub fn discard_question(&mut self, round: Round, id: Uuid) {
        if let Some(items) = self.rounds.interview_mut(round) {
            items.retain(|q| q.id != Some(id));
        }
    }

    /// Puts a promoted library question at the top of an interview round.
    /// It keeps no id until the draft is persisted.
    pub fn insert_from_library(
        &mut self,
        round: Round,
        text: String,
        defaults: QuestionDefaults,
    ) -> Result<usize, DraftError> {
        let items = self
            .rounds
            .interview_mut(round)
            .ok_or(DraftError::RoundMismatch { round })?;
        items.insert(
            0,
            Question {
                id: None,
                text,
                prepare_time_seconds: defaults.prepare_time_seconds,
                answer_time_minutes: defaults.answer_time_minutes,
                provenance: Provenance::Library,
            },
        );
        Ok(items.len())
    }

    /// Gives every id-less question a stable id ahead of persistence.
    pub fn assign_missing_ids(&mut self) {
        stamp_ids(&mut self.rounds.general);
        stamp_ids(&mut self.rounds.position);
        stamp_ids(&mut self.rounds.coding);
        stamp_ids(&mut self.rounds.aptitude);
    }

    /// Assembles the aggregate with totals derived from the current rounds.
    pub fn to_question_set(&self, id: Uuid, code: String) -> QuestionSet {
        let summary = self.summary();
        QuestionSet {
            id,
            organization_id: self.organization_id,
            position_id: self.position_id,
            code,
            interview_platform: self.interview_platform,
            interview_mode: self.interview_mode,
            shuffle: self.shuffle,
            instruction_text: self.instruction_text.clone(),
            rounds: self.rounds.clone(),
            total_questions: summary.total_questions as u32,
            total_duration_minutes: summary.total_minutes,
        }
    }
}

fn push_with_id<Q: RoundItem>(items: &mut Vec<Q>, mut item: Q) -> QuestionKey {
    if item.id().is_none() {
        item.set_id(Uuid::new_v4());
    }
    let key = QuestionKey::of(&item);
    items.push(item);
    key
}

fn find_mut<'a, Q: RoundItem>(
    items: &'a mut [Q],
    round: Round,
    key: &QuestionKey,
) -> Result<&'a mut Q, DraftError> {
    items
        .iter_mut()
        .find(|q| key.matches(&**q))
        .ok_or_else(|| DraftError::UnknownQuestion {
            round,
            key: key.clone(),
        })
}

fn remove_by_key<Q: RoundItem>(items: &mut Vec<Q>, key: &QuestionKey) -> bool {
    match items.iter().position(|q| key.matches(q)) {
        Some(index) => {
            items.remove(index);
            true
        }
        None => false,
    }
}

fn stamp_ids<Q: RoundItem>(items: &mut [Q]) {
    for item in items.iter_mut().filter(|q| q.id().is_none()) {
        item.set_id(Uuid::new_v4());
    }
}
