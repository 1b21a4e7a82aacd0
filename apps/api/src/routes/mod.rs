pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::generation::handlers as generation;
use crate::question_set::handlers as drafts;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Draft editing sessions
        .route("/api/v1/drafts", post(drafts::handle_open_draft))
        .route(
            "/api/v1/drafts/:id",
            get(drafts::handle_get_draft).delete(drafts::handle_close_draft),
        )
        .route(
            "/api/v1/drafts/:id/questions",
            post(drafts::handle_add_question).patch(drafts::handle_update_question),
        )
        .route(
            "/api/v1/drafts/:id/questions/remove",
            post(drafts::handle_remove_question),
        )
        .route(
            "/api/v1/drafts/:id/settings",
            put(drafts::handle_update_settings),
        )
        .route(
            "/api/v1/drafts/:id/defaults",
            put(drafts::handle_update_defaults),
        )
        .route(
            "/api/v1/drafts/:id/validation",
            get(drafts::handle_validate_draft),
        )
        .route("/api/v1/drafts/:id/submit", post(drafts::handle_submit_draft))
        // Generation (SSE)
        .route(
            "/api/v1/drafts/:id/generate",
            post(generation::handle_generate_question).delete(generation::handle_cancel_generation),
        )
        .route(
            "/api/v1/drafts/:id/library",
            post(generation::handle_library_search),
        )
        .route(
            "/api/v1/drafts/:id/library/promote",
            post(generation::handle_promote_preview),
        )
        // Downstream reads
        .route(
            "/api/v1/question-sets/:id",
            get(drafts::handle_get_question_set),
        )
        .route(
            "/api/v1/question-sets/:id/sections",
            get(drafts::handle_get_sections),
        )
        .route(
            "/api/v1/question-sets/:id/instructions",
            get(drafts::handle_get_instructions),
        )
        .route("/api/v1/assessments", get(drafts::handle_get_assessment))
        .with_state(state)
}
