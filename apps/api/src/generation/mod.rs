//! AI question generation and question-library search.
//!
//! Both features share one contract: open a generation channel for a single
//! request, collect its result, then reveal the text into the editing session
//! at a fixed cadence. All model traffic goes through a `GenerationChannel`.

pub mod channel;
pub mod handlers;
pub mod library;
pub mod llm_channel;
pub mod prompts;
pub mod reveal;
pub mod stream;
pub mod ws_channel;

use thiserror::Error;

use crate::errors::AppError;
use crate::llm_client::LlmError;
use crate::question_set::draft::DraftError;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation channel failed: {0}")]
    Channel(String),

    #[error("Generation service reported an error: {0}")]
    Service(String),

    #[error("Generation channel closed before a result arrived")]
    Closed,

    #[error("Generation service returned an empty result")]
    Empty,

    #[error("Generated question already exists in the draft: {0}")]
    Duplicate(String),

    #[error("Malformed generation frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Draft(#[from] DraftError),
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        AppError::Generation(err.to_string())
    }
}
