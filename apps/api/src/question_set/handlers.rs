//! Axum route handlers for draft editing, submit and downstream reads.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::assessment::{AssessmentKey, AssessmentState};
use crate::models::question_set::{
    InterviewMode, InterviewPlatform, QuestionKey, QuestionSet, Round, ShuffleFlags,
};
use crate::question_set::documents::{InstructionDocument, SectionDocument};
use crate::question_set::draft::{FieldUpdate, NewQuestion, QuestionDefaults, QuestionSetDraft};
use crate::question_set::persistence::{submit_question_set, SubmitReport};
use crate::question_set::validation::{validate_draft, ValidationReport};
use crate::session::{DraftView, SessionHandle};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenDraftRequest {
    pub organization_id: Uuid,
    pub position_id: Uuid,
    /// Present when editing an existing question set.
    pub question_set_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct QuestionAdded {
    pub key: QuestionKey,
    pub draft: DraftView,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub round: Round,
    pub key: QuestionKey,
    pub update: FieldUpdate,
}

#[derive(Debug, Deserialize)]
pub struct RemoveQuestionRequest {
    pub round: Round,
    pub key: QuestionKey,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub interview_platform: Option<InterviewPlatform>,
    pub interview_mode: Option<InterviewMode>,
    pub instruction_text: Option<String>,
    pub shuffle: Option<ShuffleFlags>,
}

#[derive(Debug, Deserialize)]
pub struct DefaultsRequest {
    pub round: Round,
    pub defaults: QuestionDefaults,
}

#[derive(Debug, Deserialize)]
pub struct AssessmentQuery {
    pub candidate_id: Uuid,
    pub position_id: Uuid,
    pub question_set_id: Uuid,
}

pub(crate) async fn find_session(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Draft session {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Draft sessions
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/drafts
///
/// Opens an editing session: a fresh draft, or an existing question set
/// loaded for editing.
pub async fn handle_open_draft(
    State(state): State<AppState>,
    Json(request): Json<OpenDraftRequest>,
) -> Result<(StatusCode, Json<DraftView>), AppError> {
    let draft = match request.question_set_id {
        Some(id) => {
            let set = state
                .stores
                .question_sets
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Question set {id} not found")))?;
            if set.position_id != request.position_id
                || set.organization_id != request.organization_id
            {
                return Err(AppError::Conflict(format!(
                    "Question set {id} belongs to a different position"
                )));
            }
            QuestionSetDraft::from_question_set(&set)
        }
        None => QuestionSetDraft::new(request.organization_id, request.position_id),
    };

    let session = state
        .sessions
        .open(draft, state.settings.round_defaults())
        .await;
    let view = session.lock().await.view();
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/drafts/:id
pub async fn handle_get_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DraftView>, AppError> {
    let session = find_session(&state, id).await?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

/// DELETE /api/v1/drafts/:id
///
/// Closes the session, cancelling any running generation.
pub async fn handle_close_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.close(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Draft session {id} not found")))
    }
}

/// POST /api/v1/drafts/:id/questions
pub async fn handle_add_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(question): Json<NewQuestion>,
) -> Result<Json<QuestionAdded>, AppError> {
    let session = find_session(&state, id).await?;
    let round = question.round();
    let mut s = session.lock().await;
    let key = s.draft.add_question(question);
    debug!(session_id = %id, %round, "Question added");
    Ok(Json(QuestionAdded {
        key,
        draft: s.view(),
    }))
}

/// PATCH /api/v1/drafts/:id/questions
pub async fn handle_update_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateQuestionRequest>,
) -> Result<Json<DraftView>, AppError> {
    let session = find_session(&state, id).await?;
    let mut s = session.lock().await;
    s.draft
        .update_question_field(request.round, &request.key, request.update)?;
    Ok(Json(s.view()))
}

/// POST /api/v1/drafts/:id/questions/remove
pub async fn handle_remove_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RemoveQuestionRequest>,
) -> Result<Json<DraftView>, AppError> {
    let session = find_session(&state, id).await?;
    let mut s = session.lock().await;
    s.draft.remove_question(request.round, &request.key)?;
    Ok(Json(s.view()))
}

/// PUT /api/v1/drafts/:id/settings
pub async fn handle_update_settings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<DraftView>, AppError> {
    let session = find_session(&state, id).await?;
    let mut s = session.lock().await;
    if let Some(platform) = request.interview_platform {
        s.draft.interview_platform = platform;
    }
    if let Some(mode) = request.interview_mode {
        s.draft.interview_mode = mode;
    }
    if let Some(text) = request.instruction_text {
        s.draft.instruction_text = text;
    }
    if let Some(shuffle) = request.shuffle {
        for round in Round::ALL {
            s.draft.set_shuffle(round, shuffle.get(round));
        }
    }
    Ok(Json(s.view()))
}

/// PUT /api/v1/drafts/:id/defaults
///
/// Sets the "add new" values used for generated and library questions.
pub async fn handle_update_defaults(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DefaultsRequest>,
) -> Result<Json<DraftView>, AppError> {
    let session = find_session(&state, id).await?;
    let mut s = session.lock().await;
    s.defaults.set(request.round, request.defaults)?;
    Ok(Json(s.view()))
}

/// GET /api/v1/drafts/:id/validation
pub async fn handle_validate_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ValidationReport>, AppError> {
    let session = find_session(&state, id).await?;
    let report = validate_draft(&session.lock().await.draft);
    Ok(Json(report))
}

/// POST /api/v1/drafts/:id/submit
///
/// Stops any generation, persists the draft and fans it out. The session is
/// closed only when the question set itself was saved; otherwise the user
/// stays on the draft with the error. A second submit while one is running
/// is a conflict.
///
/// The save runs as its own task so a dropped connection cannot leave it
/// half done or leave the session claimed.
pub async fn handle_submit_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmitReport>, AppError> {
    let session = find_session(&state, id).await?;
    let draft = {
        let mut s = session.lock().await;
        if !s.claim_submit() {
            return Err(AppError::Conflict(
                "This draft is already being submitted".to_string(),
            ));
        }
        s.cancel_generation();
        s.draft.clone()
    };

    let stores = state.stores.clone();
    let sessions = state.sessions.clone();
    let concurrency = state.settings.fanout_concurrency;
    let task = tokio::spawn(async move {
        let result = submit_question_set(&stores, draft, concurrency).await;
        if result.is_ok() {
            sessions.close(id).await;
        } else {
            session.lock().await.release_submit();
        }
        result
    });

    let report = task
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("Submit task failed")))??;

    info!(
        session_id = %id,
        question_set_id = %report.question_set_id,
        warnings = report.warnings.len(),
        "Draft submitted"
    );
    Ok(Json(report))
}

// ────────────────────────────────────────────────────────────────────────────
// Downstream reads
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/question-sets/:id
pub async fn handle_get_question_set(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestionSet>, AppError> {
    let set = state
        .stores
        .question_sets
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Question set {id} not found")))?;
    Ok(Json(set))
}

/// GET /api/v1/question-sets/:id/sections
pub async fn handle_get_sections(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SectionDocument>, AppError> {
    let doc = state
        .stores
        .sections
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Sections for question set {id} not found")))?;
    Ok(Json(doc))
}

/// GET /api/v1/question-sets/:id/instructions
pub async fn handle_get_instructions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstructionDocument>, AppError> {
    let doc = state.stores.instructions.get(id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Instructions for question set {id} not found"))
    })?;
    Ok(Json(doc))
}

/// GET /api/v1/assessments?candidate_id&position_id&question_set_id
pub async fn handle_get_assessment(
    State(state): State<AppState>,
    Query(query): Query<AssessmentQuery>,
) -> Result<Json<AssessmentState>, AppError> {
    let key = AssessmentKey {
        candidate_id: query.candidate_id,
        position_id: query.position_id,
        question_set_id: query.question_set_id,
    };
    let assessment = state
        .stores
        .assessments
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment state not found".to_string()))?;
    Ok(Json(assessment))
}
