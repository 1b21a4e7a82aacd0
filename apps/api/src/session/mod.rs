//! Editing sessions: the single owner of a draft while it is being edited.
//!
//! A session holds the draft, the "add new" defaults for the interview rounds,
//! the library preview list and at most one running generation. Everything a
//! generation task does to the draft happens under the session lock and only
//! while that task's request is still the active one.

pub mod registry;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::info;
use uuid::Uuid;

use crate::generation::channel::GenerationKind;
use crate::generation::library::PreviewItem;
use crate::generation::stream::StreamState;
use crate::generation::GenerationError;
use crate::models::question_set::Round;
use crate::question_set::draft::{DraftError, QuestionDefaults, QuestionSetDraft};
use crate::question_set::persistence::{round_timings, RoundTiming};
use crate::question_set::validation::{validate_draft, ValidationReport};

pub use registry::{SessionHandle, SessionRegistry};

const EVENT_BUFFER: usize = 256;

// ────────────────────────────────────────────────────────────────────────────
// Defaults and events
// ────────────────────────────────────────────────────────────────────────────

/// "Add new" control values for the two interview rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundDefaults {
    pub general: QuestionDefaults,
    pub position: QuestionDefaults,
}

impl RoundDefaults {
    pub fn uniform(defaults: QuestionDefaults) -> Self {
        Self {
            general: defaults,
            position: defaults,
        }
    }

    pub fn for_round(&self, round: Round) -> Option<QuestionDefaults> {
        match round {
            Round::General => Some(self.general),
            Round::Position => Some(self.position),
            Round::Coding | Round::Aptitude => None,
        }
    }

    pub fn set(&mut self, round: Round, defaults: QuestionDefaults) -> Result<(), DraftError> {
        match round {
            Round::General => self.general = defaults,
            Round::Position => self.position = defaults,
            Round::Coding | Round::Aptitude => return Err(DraftError::RoundMismatch { round }),
        }
        Ok(())
    }
}

/// Progress of a generation, pushed to subscribers of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    State {
        request_id: Uuid,
        state: StreamState,
    },
    QuestionInserted {
        request_id: Uuid,
        round: Round,
        question_id: Uuid,
    },
    Reveal {
        request_id: Uuid,
        round: Round,
        question_id: Uuid,
        chunk: String,
    },
    PreviewStaged {
        request_id: Uuid,
        preview_id: Uuid,
    },
    PreviewReveal {
        request_id: Uuid,
        preview_id: Uuid,
        chunk: String,
    },
    PreviewReady {
        request_id: Uuid,
        preview_id: Uuid,
    },
    Completed {
        request_id: Uuid,
    },
    Failed {
        request_id: Uuid,
        message: String,
    },
    Cancelled {
        request_id: Uuid,
    },
}

impl SessionEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            SessionEvent::State { request_id, .. }
            | SessionEvent::QuestionInserted { request_id, .. }
            | SessionEvent::Reveal { request_id, .. }
            | SessionEvent::PreviewStaged { request_id, .. }
            | SessionEvent::PreviewReveal { request_id, .. }
            | SessionEvent::PreviewReady { request_id, .. }
            | SessionEvent::Completed { request_id }
            | SessionEvent::Failed { request_id, .. }
            | SessionEvent::Cancelled { request_id } => *request_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::State { .. } => "state",
            SessionEvent::QuestionInserted { .. } => "question_inserted",
            SessionEvent::Reveal { .. } => "reveal",
            SessionEvent::PreviewStaged { .. } => "preview_staged",
            SessionEvent::PreviewReveal { .. } => "preview_reveal",
            SessionEvent::PreviewReady { .. } => "preview_ready",
            SessionEvent::Completed { .. } => "completed",
            SessionEvent::Failed { .. } => "failed",
            SessionEvent::Cancelled { .. } => "cancelled",
        }
    }

    /// No further events follow for this request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Completed { .. }
                | SessionEvent::Failed { .. }
                | SessionEvent::Cancelled { .. }
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Active generation
// ────────────────────────────────────────────────────────────────────────────

/// What a running reveal is currently writing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealTarget {
    Question { round: Round, id: Uuid },
    Preview { id: Uuid },
}

/// Handle to the one running generation task. Dropping it aborts the task,
/// which also drops the task's channel.
#[derive(Debug)]
pub struct ActiveGeneration {
    pub request_id: Uuid,
    pub kind: GenerationKind,
    abort: Option<AbortHandle>,
    revealing: Option<RevealTarget>,
}

impl ActiveGeneration {
    pub fn new(request_id: Uuid, kind: GenerationKind, abort: AbortHandle) -> Self {
        Self {
            request_id,
            kind,
            abort: Some(abort),
            revealing: None,
        }
    }

    /// Used when the task finishes on its own.
    fn disarm(&mut self) {
        self.abort = None;
    }
}

impl Drop for ActiveGeneration {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct EditingSession {
    pub id: Uuid,
    pub draft: QuestionSetDraft,
    pub defaults: RoundDefaults,
    pub preview: Vec<PreviewItem>,
    state: StreamState,
    active: Option<ActiveGeneration>,
    submitting: bool,
    events: broadcast::Sender<SessionEvent>,
}

/// Read model returned by the draft endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub session_id: Uuid,
    pub draft: QuestionSetDraft,
    pub defaults: RoundDefaults,
    pub total_questions: usize,
    pub total_duration_minutes: f64,
    pub rounds: Vec<RoundTiming>,
    pub preview: Vec<PreviewItem>,
    pub generation: StreamState,
    pub active_request: Option<Uuid>,
    pub validation: ValidationReport,
}

impl EditingSession {
    pub fn new(id: Uuid, draft: QuestionSetDraft, defaults: RoundDefaults) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            id,
            draft,
            defaults,
            preview: Vec::new(),
            state: StreamState::Idle,
            active: None,
            submitting: false,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Nobody listening is fine.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn active_request(&self) -> Option<Uuid> {
        self.active.as_ref().map(|a| a.request_id)
    }

    pub fn is_active(&self, request_id: Uuid) -> bool {
        self.active_request() == Some(request_id)
    }

    /// Marks the draft as being saved. False while another save is running.
    pub fn claim_submit(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.submitting = true;
        true
    }

    pub fn release_submit(&mut self) {
        self.submitting = false;
    }

    /// A save or a generation is in flight.
    pub fn is_busy(&self) -> bool {
        self.submitting || self.active.is_some()
    }

    /// Installs a new generation, superseding whatever was running.
    pub fn begin(&mut self, active: ActiveGeneration) {
        self.cancel_generation();
        if active.kind == GenerationKind::Library {
            self.preview.clear();
        }
        self.state = StreamState::Idle;
        self.active = Some(active);
    }

    /// Moves the active request to `state`. Returns false for a stale request.
    pub fn transition(&mut self, request_id: Uuid, state: StreamState) -> bool {
        if !self.is_active(request_id) {
            return false;
        }
        self.state = state;
        self.emit(SessionEvent::State { request_id, state });
        true
    }

    pub fn mark_revealing(&mut self, request_id: Uuid, target: Option<RevealTarget>) {
        if let Some(active) = self.active.as_mut().filter(|a| a.request_id == request_id) {
            active.revealing = target;
        }
    }

    /// Stops the running generation, drops its channel and removes whatever
    /// it was halfway through revealing.
    pub fn cancel_generation(&mut self) -> Option<Uuid> {
        let active = self.active.take()?;
        match active.revealing {
            Some(RevealTarget::Question { round, id }) => self.draft.discard_question(round, id),
            Some(RevealTarget::Preview { id }) => self.preview.retain(|p| p.id != id),
            None => {}
        }
        self.state = StreamState::Idle;
        let request_id = active.request_id;
        drop(active);
        info!(session_id = %self.id, request_id = %request_id, "Generation cancelled");
        self.emit(SessionEvent::Cancelled { request_id });
        Some(request_id)
    }

    /// Cancels only if `request_id` is still the running one.
    pub fn cancel_request(&mut self, request_id: Uuid) -> bool {
        self.is_active(request_id) && self.cancel_generation().is_some()
    }

    /// Called by the generation task itself when it ends.
    pub fn finish(&mut self, request_id: Uuid, outcome: Result<(), GenerationError>) {
        if !self.is_active(request_id) {
            return;
        }
        if let Some(mut active) = self.active.take() {
            active.disarm();
        }
        match outcome {
            Ok(()) => {
                self.state = StreamState::Done;
                self.emit(SessionEvent::State {
                    request_id,
                    state: StreamState::Done,
                });
                self.emit(SessionEvent::Completed { request_id });
            }
            Err(err) => {
                self.state = StreamState::Error;
                self.emit(SessionEvent::State {
                    request_id,
                    state: StreamState::Error,
                });
                self.emit(SessionEvent::Failed {
                    request_id,
                    message: err.to_string(),
                });
            }
        }
    }

    /// Moves a fully revealed preview item to the top of `round`.
    /// Returns the new question count of that round.
    pub fn promote(&mut self, index: usize, round: Round) -> Result<usize, DraftError> {
        let defaults = self
            .defaults
            .for_round(round)
            .ok_or(DraftError::RoundMismatch { round })?;
        let text = match self.preview.get(index) {
            Some(item) if item.revealed => item.text.clone(),
            _ => return Err(DraftError::PreviewUnavailable { index }),
        };
        let count = self.draft.insert_from_library(round, text, defaults)?;
        self.preview.remove(index);
        Ok(count)
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            session_id: self.id,
            draft: self.draft.clone(),
            defaults: self.defaults,
            total_questions: self.draft.total_questions(),
            total_duration_minutes: self.draft.total_duration(),
            rounds: round_timings(&self.draft.summary()),
            preview: self.preview.clone(),
            generation: self.state(),
            active_request: self.active_request(),
            validation: validate_draft(&self.draft),
        }
    }
}
