//! The generation channel contract: one request in, a stream of frames out.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GenerationError;
use crate::models::position::PositionProfile;
use crate::models::question_set::Round;

/// Position details that steer generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub job_title: String,
    pub domain: Option<String>,
    pub min_experience: Option<i32>,
    pub max_experience: Option<i32>,
    pub mandatory_skills: Vec<String>,
    pub optional_skills: Vec<String>,
}

impl From<&PositionProfile> for GenerationContext {
    fn from(position: &PositionProfile) -> Self {
        GenerationContext {
            job_title: position.title.clone(),
            domain: position.domain.clone(),
            min_experience: position.min_experience,
            max_experience: position.max_experience,
            mandatory_skills: position.mandatory_skills.clone(),
            optional_skills: position.optional_skills.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// One new question for an interview round.
    Question,
    /// A batch of questions from a named external corpus.
    Library,
}

/// The JSON object sent when a channel is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: Uuid,
    pub kind: GenerationKind,
    pub round: Round,
    pub context: GenerationContext,
    /// Every question text already in the draft, so the service can avoid repeats.
    pub existing_questions: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl GenerationRequest {
    pub fn question(round: Round, context: GenerationContext, existing: Vec<String>) -> Self {
        GenerationRequest {
            request_id: Uuid::new_v4(),
            kind: GenerationKind::Question,
            round,
            context,
            existing_questions: existing,
            count: 1,
            source: None,
            category: None,
        }
    }

    pub fn library(
        round: Round,
        context: GenerationContext,
        existing: Vec<String>,
        source: String,
        category: String,
        count: usize,
    ) -> Self {
        GenerationRequest {
            request_id: Uuid::new_v4(),
            kind: GenerationKind::Library,
            round,
            context,
            existing_questions: existing,
            count,
            source: Some(source),
            category: Some(category),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationFrame {
    /// The complete result in one frame.
    Result { content: String },
    /// A fragment; fragments are concatenated until `Done`.
    Delta { content: String },
    Done,
    Error { message: String },
}

impl GenerationFrame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationFrame::Delta { .. })
    }
}

pub fn parse_frame(text: &str) -> Result<GenerationFrame, GenerationError> {
    Ok(serde_json::from_str(text)?)
}

pub type FrameStream = BoxStream<'static, Result<GenerationFrame, GenerationError>>;

/// A duplex transport scoped to one request. Dropping the returned stream
/// closes the channel.
#[async_trait]
pub trait GenerationChannel: Send + Sync {
    async fn open(&self, request: GenerationRequest) -> Result<FrameStream, GenerationError>;
}

/// Consumes frames until a terminal one arrives and returns the full text.
///
/// A `result` frame wins outright; otherwise deltas accumulate until `done`.
/// The returned text is untrimmed; callers decide what counts as empty.
pub async fn collect_response(mut frames: FrameStream) -> Result<String, GenerationError> {
    let mut buffer = String::new();
    while let Some(frame) = frames.next().await {
        match frame? {
            GenerationFrame::Result { content } => return Ok(content),
            GenerationFrame::Delta { content } => buffer.push_str(&content),
            GenerationFrame::Done => return Ok(buffer),
            GenerationFrame::Error { message } => return Err(GenerationError::Service(message)),
        }
    }
    Err(GenerationError::Closed)
}

#[cfg(test)]
pub mod testing {
    //! A channel that replays canned frames.

    use std::sync::Mutex;

    use futures::stream;

    use super::*;

    pub enum Script {
        Frames(Vec<GenerationFrame>),
        ConnectError(String),
        /// Never answers.
        Hang,
    }

    pub struct ScriptedChannel {
        scripts: Mutex<Vec<Script>>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedChannel {
        /// Scripts are consumed in order, one per `open`; the last one repeats.
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn answering(text: &str) -> Self {
            Self::new(vec![Script::Frames(vec![GenerationFrame::Result {
                content: text.to_string(),
            }])])
        }

        pub fn last_request(&self) -> Option<GenerationRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl GenerationChannel for ScriptedChannel {
        async fn open(&self, request: GenerationRequest) -> Result<FrameStream, GenerationError> {
            self.requests.lock().unwrap().push(request);
            let script = {
                let mut scripts = self.scripts.lock().unwrap();
                if scripts.len() > 1 {
                    scripts.remove(0)
                } else {
                    match scripts.first() {
                        Some(Script::Frames(frames)) => Script::Frames(frames.clone()),
                        Some(Script::ConnectError(msg)) => Script::ConnectError(msg.clone()),
                        Some(Script::Hang) | None => Script::Hang,
                    }
                }
            };
            match script {
                Script::Frames(frames) => Ok(stream::iter(frames.into_iter().map(Ok)).boxed()),
                Script::ConnectError(msg) => Err(GenerationError::Channel(msg)),
                Script::Hang => Ok(stream::pending().boxed()),
            }
        }
    }
}
