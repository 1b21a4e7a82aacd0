//! Generation backed directly by the model. The reply is streamed, so text
//! arrives as `delta` frames and ends with `done`.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::info;

use super::channel::{
    FrameStream, GenerationChannel, GenerationFrame, GenerationKind, GenerationRequest,
};
use super::prompts::{library_prompt, question_prompt, LIBRARY_SYSTEM, QUESTION_SYSTEM};
use super::GenerationError;
use crate::llm_client::events::TextEvent;
use crate::llm_client::{LlmClient, LlmError};

pub struct LlmGenerationChannel {
    llm: LlmClient,
}

impl LlmGenerationChannel {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl GenerationChannel for LlmGenerationChannel {
    async fn open(&self, request: GenerationRequest) -> Result<FrameStream, GenerationError> {
        let (prompt, system) = match request.kind {
            GenerationKind::Question => (question_prompt(&request), QUESTION_SYSTEM),
            GenerationKind::Library => (library_prompt(&request), LIBRARY_SYSTEM),
        };

        let events = self.llm.stream_text(&prompt, system).await?;
        info!(
            request_id = %request.request_id,
            kind = ?request.kind,
            "Model stream opened"
        );

        Ok(events.map(to_frame).boxed())
    }
}

fn to_frame(event: Result<TextEvent, LlmError>) -> Result<GenerationFrame, GenerationError> {
    match event? {
        TextEvent::Delta(content) => Ok(GenerationFrame::Delta { content }),
        TextEvent::Stop => Ok(GenerationFrame::Done),
    }
}
