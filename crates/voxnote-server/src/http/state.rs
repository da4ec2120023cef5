use std::sync::Arc;

use voxnote_core::{ConfigStore, HistoryStore, ProcessingOrchestrator, SessionController};

/// Shared application state for HTTP handlers. The components are owned by
/// the process entry point and handed in here by reference.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub history: Arc<HistoryStore>,
    pub orchestrator: Arc<ProcessingOrchestrator>,
    pub session: Arc<SessionController>,
}
