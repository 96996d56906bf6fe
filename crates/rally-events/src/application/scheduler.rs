//! The periodic trigger loop.

use std::sync::Arc;

use rally_core::ids::CommunityId;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::engine::EventEngine;
use crate::domain::outcomes::TickOutcome;

/// Drives [`EventEngine::tick`] for every configured community on a fixed
/// interval.
#[derive(Clone)]
pub struct Scheduler {
    engine: Arc<EventEngine>,
}

impl Scheduler {
    /// Creates a scheduler for `engine`.
    #[must_use]
    pub fn new(engine: Arc<EventEngine>) -> Self {
        Self { engine }
    }

    /// Ticks until `shutdown` flips to `true` or its sender is dropped.
    /// Tick errors are logged and never stop the loop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.engine.config().tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            communities = self.engine.config().communities.len(),
            interval = ?self.engine.config().tick_interval,
            "scheduler running"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_all().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler stopped");
    }

    /// One tick for every community. Failed ticks are logged and skipped.
    pub async fn tick_all(&self) -> Vec<(CommunityId, TickOutcome)> {
        let mut outcomes = Vec::new();
        for &community in &self.engine.config().communities {
            match self.engine.tick(community).await {
                Ok(outcome) => {
                    debug!(%community, ?outcome, "tick");
                    outcomes.push((community, outcome));
                }
                Err(e) => {
                    error!(%community, error = %e, retryable = e.is_retryable(), "tick failed");
                }
            }
        }
        outcomes
    }
}
