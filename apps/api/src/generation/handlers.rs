//! Axum route handlers for AI generation and library search.
//!
//! Both start a generation in the session and answer with a Server-Sent
//! Events stream of that request's events. The stream ends with a
//! `completed`, `failed` or `cancelled` event; a client that disconnects
//! before then cancels the generation.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::channel::GenerationContext;
use crate::generation::library::DEFAULT_CATEGORY;
use crate::generation::stream::{start_library_search, start_question_generation, LibraryQuery};
use crate::models::question_set::Round;
use crate::question_set::handlers::find_session;
use crate::session::{DraftView, SessionEvent, SessionHandle, SessionRegistry};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateQuestionRequest {
    pub round: Round,
}

#[derive(Debug, Deserialize)]
pub struct LibrarySearchRequest {
    /// Free-text corpus name, e.g. a company.
    pub source: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default = "default_library_round")]
    pub round: Round,
}

fn default_library_round() -> Round {
    Round::Position
}

impl LibrarySearchRequest {
    /// Batch size is capped at `max_batch`; a missing or zero count asks for
    /// the full batch.
    fn into_query(self, max_batch: usize) -> Result<LibraryQuery, AppError> {
        let source = self.source.trim().to_string();
        if source.is_empty() {
            return Err(AppError::Validation("source cannot be empty".to_string()));
        }
        let max_batch = max_batch.max(1);
        Ok(LibraryQuery {
            round: self.round,
            source,
            category: self
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            count: match self.count {
                Some(0) | None => max_batch,
                Some(n) => n.min(max_batch),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    /// Position in the preview list.
    pub index: usize,
    pub round: Round,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/drafts/:id/generate
pub async fn handle_generate_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GenerateQuestionRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let session = find_session(&state, id).await?;
    let context = generation_context(&state, &session).await?;

    let (request_id, events) = start_question_generation(
        &session,
        state.generator.clone(),
        request.round,
        context,
        state.settings.reveal(),
    )
    .await?;

    Ok(event_stream(state.sessions.clone(), id, request_id, events))
}

/// DELETE /api/v1/drafts/:id/generate
pub async fn handle_cancel_generation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = find_session(&state, id).await?;
    let cancelled = session.lock().await.cancel_generation();
    match cancelled {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::Conflict("No generation is running".to_string())),
    }
}

/// POST /api/v1/drafts/:id/library
pub async fn handle_library_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<LibrarySearchRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let query = request.into_query(state.settings.library_batch_size)?;
    let session = find_session(&state, id).await?;
    let context = generation_context(&state, &session).await?;

    let (request_id, events) = start_library_search(
        &session,
        state.generator.clone(),
        query,
        context,
        state.settings.reveal(),
    )
    .await?;

    Ok(event_stream(state.sessions.clone(), id, request_id, events))
}

/// POST /api/v1/drafts/:id/library/promote
pub async fn handle_promote_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PromoteRequest>,
) -> Result<Json<DraftView>, AppError> {
    let session = find_session(&state, id).await?;
    let mut s = session.lock().await;
    s.promote(request.index, request.round)?;
    Ok(Json(s.view()))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn generation_context(
    state: &AppState,
    session: &SessionHandle,
) -> Result<GenerationContext, AppError> {
    let position_id = session.lock().await.draft.position_id;
    let position = state
        .stores
        .positions
        .position(position_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Position {position_id} not found")))?;
    Ok(GenerationContext::from(&position))
}

/// Cancels the generation when the SSE response is dropped early.
struct CancelOnDrop {
    sessions: Arc<SessionRegistry>,
    session_id: Uuid,
    request_id: Uuid,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let sessions = self.sessions.clone();
        let (session_id, request_id) = (self.session_id, self.request_id);
        runtime.spawn(async move {
            if let Some(session) = sessions.get(session_id).await {
                if session.lock().await.cancel_request(request_id) {
                    info!(%session_id, %request_id, "Client disconnected, generation cancelled");
                }
            }
        });
    }
}

fn to_sse(event: &SessionEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.name()).json_data(event)
}

fn event_stream(
    sessions: Arc<SessionRegistry>,
    session_id: Uuid,
    request_id: Uuid,
    events: broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let guard = CancelOnDrop {
        sessions,
        session_id,
        request_id,
        armed: true,
    };

    let stream = stream::unfold(Some((events, guard)), move |state| async move {
        let (mut events, mut guard) = state?;
        loop {
            match events.recv().await {
                Ok(event) if event.request_id() != request_id => continue,
                Ok(event) => {
                    let sse = to_sse(&event);
                    if event.is_terminal() {
                        guard.armed = false;
                        return Some((sse, None));
                    }
                    return Some((sse, Some((events, guard))));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%request_id, "SSE subscriber lagged, {skipped} events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
