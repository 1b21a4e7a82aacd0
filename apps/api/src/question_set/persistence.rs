//! Submit pipeline for a question-set draft.
//!
//! Flow: validate → compute totals → upsert aggregate (fatal on failure) →
//!       section document → instruction document → resolve bound candidates →
//!       upsert one assessment state per candidate.
//!
//! Only the aggregate write can fail the submit. Everything after it is
//! best-effort: failures are logged and collected into `SubmitReport::warnings`.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::assessment::{AssessmentAssignment, AssessmentKey};
use crate::models::position::CandidateRef;
use crate::models::question_set::{QuestionSet, Round};
use crate::question_set::documents::{InstructionDocument, SectionDocument};
use crate::question_set::draft::QuestionSetDraft;
use crate::question_set::duration::DurationSummary;
use crate::question_set::validation::ensure_valid;
use crate::stores::{AssessmentStateStore, Stores};

// ────────────────────────────────────────────────────────────────────────────
// Report types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStep {
    SectionDocument,
    InstructionDocument,
    CandidateLookup,
    CandidateSync,
}

/// A non-fatal failure recorded during submit.
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub step: SubmitStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundTiming {
    pub round: Round,
    pub question_count: usize,
    pub duration_minutes: f64,
    pub allocated_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    pub question_set_id: Uuid,
    pub code: String,
    pub created: bool,
    pub total_questions: usize,
    pub total_duration_minutes: f64,
    pub rounds: Vec<RoundTiming>,
    pub candidates_synced: usize,
    pub candidates_failed: usize,
    pub warnings: Vec<StepFailure>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Persists a draft and fans the resulting round configuration out to every
/// candidate bound to the position.
///
/// `fanout_concurrency` bounds how many assessment upserts run at once;
/// 1 keeps them strictly sequential.
pub async fn submit_question_set(
    stores: &Stores,
    mut draft: QuestionSetDraft,
    fanout_concurrency: usize,
) -> Result<SubmitReport, AppError> {
    ensure_valid(&draft)?;
    draft.assign_missing_ids();

    // Step 1: totals from current contents
    let summary = draft.summary();

    // Step 2: aggregate upsert, the only fatal step
    let created = !draft.is_edit();
    let id = draft.question_set_id.unwrap_or_else(Uuid::new_v4);
    let code = draft.code.clone().unwrap_or_else(|| new_code(id));
    let set = draft.to_question_set(id, code);

    let saved = if created {
        stores.question_sets.create(&set).await
    } else {
        stores.question_sets.update(&set).await
    };
    let question_set_id = saved.map_err(|e| {
        error!(
            position_id = %set.position_id,
            "Question set save failed: {e:#}"
        );
        AppError::Persistence(format!("Failed to save question set: {e:#}"))
    })?;
    let set = QuestionSet {
        id: question_set_id,
        ..set
    };
    info!(
        question_set_id = %question_set_id,
        position_id = %set.position_id,
        created,
        "Question set saved ({} questions, {:.2} min)",
        summary.total_questions,
        summary.total_minutes
    );

    let mut warnings = Vec::new();

    // Step 3: round-section document
    let sections = SectionDocument::build(&set);
    let written = if created {
        stores.sections.create(&sections).await
    } else {
        stores.sections.update(&sections).await
    };
    if let Err(e) = written {
        warn!(question_set_id = %question_set_id, "Section document save failed: {e:#}");
        warnings.push(failure(SubmitStep::SectionDocument, None, &e));
    }

    // Step 4: instruction document
    let instructions = InstructionDocument::build(&set);
    let written = if created {
        stores.instructions.create(&instructions).await
    } else {
        stores.instructions.update(&instructions).await
    };
    if let Err(e) = written {
        warn!(question_set_id = %question_set_id, "Instruction document save failed: {e:#}");
        warnings.push(failure(SubmitStep::InstructionDocument, None, &e));
    }

    // Step 5: candidates bound to the position; a lookup failure means none
    let candidates = match stores
        .candidates
        .bound_candidates(set.organization_id, set.position_id)
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(position_id = %set.position_id, "Candidate lookup failed, skipping fan-out: {e:#}");
            warnings.push(failure(SubmitStep::CandidateLookup, None, &e));
            Vec::new()
        }
    };

    // Step 6: per-candidate assessment state, best-effort
    let outcomes = sync_candidates(
        stores.assessments.as_ref(),
        &candidates,
        &set,
        &summary,
        fanout_concurrency,
    )
    .await;

    let mut candidates_synced = 0;
    let mut candidates_failed = 0;
    for (candidate_id, outcome) in outcomes {
        match outcome {
            Ok(()) => candidates_synced += 1,
            Err(e) => {
                candidates_failed += 1;
                warn!(
                    question_set_id = %question_set_id,
                    candidate_id = %candidate_id,
                    "Assessment state upsert failed: {e:#}"
                );
                warnings.push(failure(SubmitStep::CandidateSync, Some(candidate_id), &e));
            }
        }
    }

    info!(
        question_set_id = %question_set_id,
        "Fan-out finished: {candidates_synced} synced, {candidates_failed} failed"
    );

    Ok(SubmitReport {
        question_set_id,
        code: set.code.clone(),
        created,
        total_questions: summary.total_questions,
        total_duration_minutes: summary.total_minutes,
        rounds: round_timings(&summary),
        candidates_synced,
        candidates_failed,
        warnings,
    })
}

/// Upserts one assessment state per candidate. No ordering exists between
/// candidates; each result is independent.
async fn sync_candidates(
    store: &dyn AssessmentStateStore,
    candidates: &[CandidateRef],
    set: &QuestionSet,
    summary: &DurationSummary,
    concurrency: usize,
) -> Vec<(Uuid, anyhow::Result<()>)> {
    let assigned = Round::ALL.map(|round| summary.is_assigned(round));
    let allocated_time = summary.allocated_times();
    let assignments: Vec<AssessmentAssignment> = candidates
        .iter()
        .map(|candidate| AssessmentAssignment {
            key: AssessmentKey {
                candidate_id: candidate.id,
                position_id: set.position_id,
                question_set_id: set.id,
            },
            assigned,
            allocated_time: allocated_time.clone(),
            total_interview_time_minutes: summary.total_minutes,
        })
        .collect();

    stream::iter(assignments.into_iter().map(move |assignment| async move {
        let result = store.upsert(&assignment).await.map(|_| ());
        (assignment.key.candidate_id, result)
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await
}

pub fn round_timings(summary: &DurationSummary) -> Vec<RoundTiming> {
    Round::ALL
        .iter()
        .map(|&round| RoundTiming {
            round,
            question_count: summary.count(round),
            duration_minutes: summary.minutes(round),
            allocated_time: summary.allocated_time(round),
        })
        .collect()
}

fn failure(step: SubmitStep, candidate_id: Option<Uuid>, err: &anyhow::Error) -> StepFailure {
    StepFailure {
        step,
        candidate_id,
        message: format!("{err:#}"),
    }
}

fn new_code(id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("QS-{}", simple[..8].to_uppercase())
}
