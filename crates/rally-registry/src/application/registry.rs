//! The in-memory event catalog.

use std::sync::Arc;

use crate::domain::definition::EventDefinition;

/// Validated event definitions, ordered for the scheduler.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    definitions: Vec<Arc<EventDefinition>>,
    fingerprint: String,
}

impl EventRegistry {
    /// Builds a registry from already-validated definitions.
    ///
    /// Definitions are ordered by descending priority, ties broken by id so
    /// the scheduler's iteration order is stable.
    #[must_use]
    pub fn new(definitions: Vec<EventDefinition>, fingerprint: String) -> Self {
        let mut definitions: Vec<Arc<EventDefinition>> =
            definitions.into_iter().map(Arc::new).collect();
        definitions.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Self {
            definitions,
            fingerprint,
        }
    }

    /// Looks up a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<EventDefinition>> {
        self.definitions.iter().find(|d| d.id == id).cloned()
    }

    /// Definitions in scheduler order.
    pub fn by_priority(&self) -> impl Iterator<Item = &Arc<EventDefinition>> {
        self.definitions.iter()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry holds no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// SHA-256 of the source text this registry was loaded from.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
