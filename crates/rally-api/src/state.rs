//! Shared application state.

use std::sync::Arc;

use rally_events::application::engine::EventEngine;
use rally_quests::application::tracker::QuestTracker;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event lifecycle and contributions.
    pub engine: Arc<EventEngine>,
    /// Per-participant quests.
    pub quests: Arc<QuestTracker>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(engine: Arc<EventEngine>, quests: Arc<QuestTracker>) -> Self {
        Self { engine, quests }
    }
}
