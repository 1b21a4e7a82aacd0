use std::sync::Arc;

use crate::config::EngineSettings;
use crate::generation::channel::GenerationChannel;
use crate::session::SessionRegistry;
use crate::stores::Stores;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    /// WebSocket service or in-process LLM, chosen at startup.
    pub generator: Arc<dyn GenerationChannel>,
    pub sessions: Arc<SessionRegistry>,
    pub settings: EngineSettings,
}
