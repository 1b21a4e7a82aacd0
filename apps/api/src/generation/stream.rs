//! Generation tasks: one spawned task per request, driving
//! `idle → connecting → awaiting_response → revealing → done`
//! (or `error` before anything reaches the draft).
//!
//! The task touches the session only under its lock and only while its
//! request is still the active one, so a superseded or cancelled task can
//! never write into the draft.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::channel::{
    collect_response, GenerationChannel, GenerationContext, GenerationKind, GenerationRequest,
};
use super::library::{curate, parse_batch, PreviewItem};
use super::reveal::RevealScheduler;
use super::GenerationError;
use crate::models::question_set::Round;
use crate::question_set::draft::DraftError;
use crate::session::{ActiveGeneration, RevealTarget, SessionEvent, SessionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Connecting,
    AwaitingResponse,
    Revealing,
    Done,
    Error,
}

/// Parameters of a library batch search.
#[derive(Debug, Clone)]
pub struct LibraryQuery {
    pub round: Round,
    pub source: String,
    pub category: String,
    pub count: usize,
}

type Started = (Uuid, broadcast::Receiver<SessionEvent>);

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Starts generating one question for an interview round, superseding any
/// generation already running in the session. Returns the request id and a
/// receiver subscribed before the task can emit anything.
pub async fn start_question_generation(
    session: &SessionHandle,
    channel: Arc<dyn GenerationChannel>,
    round: Round,
    context: GenerationContext,
    reveal: RevealScheduler,
) -> Result<Started, DraftError> {
    let mut guard = session.lock().await;
    if guard.defaults.for_round(round).is_none() {
        return Err(DraftError::RoundMismatch { round });
    }

    let request = GenerationRequest::question(round, context, guard.draft.all_texts());
    let request_id = request.request_id;
    let events = guard.subscribe();

    let task = tokio::spawn(run_question(session.clone(), channel, request, reveal));
    guard.begin(ActiveGeneration::new(
        request_id,
        GenerationKind::Question,
        task.abort_handle(),
    ));
    info!(session_id = %guard.id, request_id = %request_id, %round, "Question generation started");

    Ok((request_id, events))
}

/// Starts a library batch search. Results land in the preview list, which is
/// cleared first.
pub async fn start_library_search(
    session: &SessionHandle,
    channel: Arc<dyn GenerationChannel>,
    query: LibraryQuery,
    context: GenerationContext,
    reveal: RevealScheduler,
) -> Result<Started, DraftError> {
    if !query.round.is_interview() {
        return Err(DraftError::RoundMismatch { round: query.round });
    }
    let mut guard = session.lock().await;

    let request = GenerationRequest::library(
        query.round,
        context,
        guard.draft.all_texts(),
        query.source,
        query.category,
        query.count,
    );
    let request_id = request.request_id;
    let events = guard.subscribe();

    let task = tokio::spawn(run_library(session.clone(), channel, request, reveal));
    guard.begin(ActiveGeneration::new(
        request_id,
        GenerationKind::Library,
        task.abort_handle(),
    ));
    info!(session_id = %guard.id, request_id = %request_id, "Library search started");

    Ok((request_id, events))
}

// ────────────────────────────────────────────────────────────────────────────
// Tasks
// ────────────────────────────────────────────────────────────────────────────

async fn run_question(
    session: SessionHandle,
    channel: Arc<dyn GenerationChannel>,
    request: GenerationRequest,
    reveal: RevealScheduler,
) {
    let request_id = request.request_id;
    let outcome = generate_question(&session, channel.as_ref(), request, reveal).await;
    if let Err(e) = &outcome {
        warn!(request_id = %request_id, "Question generation failed: {e}");
    }
    session.lock().await.finish(request_id, outcome);
}

async fn generate_question(
    session: &SessionHandle,
    channel: &dyn GenerationChannel,
    request: GenerationRequest,
    reveal: RevealScheduler,
) -> Result<(), GenerationError> {
    let request_id = request.request_id;
    let round = request.round;

    let raw = match fetch(session, channel, request).await? {
        Some(raw) => raw,
        None => return Ok(()),
    };
    let text = raw.trim().to_string();
    if text.is_empty() {
        return Err(GenerationError::Empty);
    }

    let question_id = {
        let mut s = session.lock().await;
        if !s.is_active(request_id) {
            return Ok(());
        }
        if s.draft.contains_text(&text) {
            return Err(GenerationError::Duplicate(text));
        }
        // The "add new" values as they are now, not when the request began.
        let defaults = s
            .defaults
            .for_round(round)
            .ok_or(DraftError::RoundMismatch { round })?;
        let id = s.draft.insert_generated(round, defaults)?;
        s.mark_revealing(request_id, Some(RevealTarget::Question { round, id }));
        s.emit(SessionEvent::QuestionInserted {
            request_id,
            round,
            question_id: id,
        });
        s.transition(request_id, StreamState::Revealing);
        id
    };

    for chunk in reveal.chunks(&text) {
        reveal.pace().await;
        let mut s = session.lock().await;
        if !s.is_active(request_id) {
            return Ok(());
        }
        if !s.draft.append_text(round, question_id, chunk) {
            // Removed by the user mid-reveal.
            break;
        }
        s.emit(SessionEvent::Reveal {
            request_id,
            round,
            question_id,
            chunk: chunk.to_string(),
        });
    }

    session.lock().await.mark_revealing(request_id, None);
    Ok(())
}

async fn run_library(
    session: SessionHandle,
    channel: Arc<dyn GenerationChannel>,
    request: GenerationRequest,
    reveal: RevealScheduler,
) {
    let request_id = request.request_id;
    let outcome = search_library(&session, channel.as_ref(), request, reveal).await;
    if let Err(e) = &outcome {
        warn!(request_id = %request_id, "Library search failed: {e}");
    }
    session.lock().await.finish(request_id, outcome);
}

async fn search_library(
    session: &SessionHandle,
    channel: &dyn GenerationChannel,
    request: GenerationRequest,
    reveal: RevealScheduler,
) -> Result<(), GenerationError> {
    let request_id = request.request_id;
    let count = request.count;

    let raw = match fetch(session, channel, request).await? {
        Some(raw) => raw,
        None => return Ok(()),
    };

    let items = {
        let mut s = session.lock().await;
        if !s.is_active(request_id) {
            return Ok(());
        }
        let items = curate(parse_batch(&raw), &s.draft.all_texts(), count);
        if items.is_empty() {
            return Err(GenerationError::Empty);
        }
        s.transition(request_id, StreamState::Revealing);
        items
    };
    info!(request_id = %request_id, "Staging {} library questions", items.len());

    // One item at a time; each is fully revealed before the next is staged.
    for text in items {
        let preview_id = Uuid::new_v4();
        {
            let mut s = session.lock().await;
            if !s.is_active(request_id) {
                return Ok(());
            }
            s.preview.push(PreviewItem {
                id: preview_id,
                request_id,
                text: String::new(),
                revealed: false,
            });
            s.mark_revealing(request_id, Some(RevealTarget::Preview { id: preview_id }));
            s.emit(SessionEvent::PreviewStaged {
                request_id,
                preview_id,
            });
        }

        for chunk in reveal.chunks(&text) {
            reveal.pace().await;
            let mut s = session.lock().await;
            if !s.is_active(request_id) {
                return Ok(());
            }
            let Some(item) = s.preview.iter_mut().find(|p| p.id == preview_id) else {
                break;
            };
            item.text.push_str(chunk);
            s.emit(SessionEvent::PreviewReveal {
                request_id,
                preview_id,
                chunk: chunk.to_string(),
            });
        }

        let mut s = session.lock().await;
        if !s.is_active(request_id) {
            return Ok(());
        }
        if let Some(item) = s.preview.iter_mut().find(|p| p.id == preview_id) {
            item.revealed = true;
        }
        s.mark_revealing(request_id, None);
        s.emit(SessionEvent::PreviewReady {
            request_id,
            preview_id,
        });
    }

    Ok(())
}

/// Opens the channel and waits for the full answer. `None` means the request
/// was superseded while waiting.
async fn fetch(
    session: &SessionHandle,
    channel: &dyn GenerationChannel,
    request: GenerationRequest,
) -> Result<Option<String>, GenerationError> {
    let request_id = request.request_id;
    if !session
        .lock()
        .await
        .transition(request_id, StreamState::Connecting)
    {
        return Ok(None);
    }
    let frames = channel.open(request).await?;

    if !session
        .lock()
        .await
        .transition(request_id, StreamState::AwaitingResponse)
    {
        return Ok(None);
    }
    collect_response(frames).await.map(Some)
}
