//! Background tasks owned by a run.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Tracks the continuation tasks of every run so they can be cancelled
/// together when the run ends, however it ends.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<Uuid, Vec<JoinHandle<()>>>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `handle` to `run_id`.
    pub fn register(&self, run_id: Uuid, handle: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(run_id)
            .or_default()
            .push(handle);
    }

    /// Aborts every task of `run_id`. Returns how many were aborted.
    pub fn cancel(&self, run_id: Uuid) -> usize {
        let handles = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&run_id)
            .unwrap_or_default();
        for handle in &handles {
            handle.abort();
        }
        if !handles.is_empty() {
            debug!(%run_id, tasks = handles.len(), "run tasks cancelled");
        }
        handles.len()
    }

    /// Number of live tasks attached to `run_id`.
    #[must_use]
    pub fn live(&self, run_id: Uuid) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id)
            .map_or(0, |handles| handles.iter().filter(|h| !h.is_finished()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_aborts_only_that_runs_tasks() {
        // Arrange
        let registry = TaskRegistry::new();
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();
        registry.register(run_a, tokio::spawn(std::future::pending()));
        registry.register(run_a, tokio::spawn(std::future::pending()));
        registry.register(run_b, tokio::spawn(std::future::pending()));

        // Act
        let cancelled = registry.cancel(run_a);

        // Assert
        assert_eq!(cancelled, 2);
        assert_eq!(registry.live(run_a), 0);
        assert_eq!(registry.live(run_b), 1);
        assert_eq!(registry.cancel(run_a), 0);
    }
}
