//! Typed persistence for active runs, cooldown history and action usage.
//!
//! Every call goes through a [`TimedStateRepository`], so a stalled backend
//! surfaces as `EngineError::Transient` instead of blocking the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rally_core::error::EngineError;
use rally_core::ids::{CommunityId, ParticipantId};
use rally_core::repository::{StateRepository, TimedStateRepository, load_typed, save_typed};

use crate::domain::state::ActiveEventState;

/// When each definition last finished, per community.
pub type FinishHistory = BTreeMap<String, DateTime<Utc>>;

/// Identifies one participant's daily usage counter for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageKey<'a> {
    /// Owning community.
    pub community: CommunityId,
    /// Event definition id.
    pub event_id: &'a str,
    /// Action index.
    pub action_index: usize,
    /// Local calendar date.
    pub date: NaiveDate,
    /// Participant.
    pub participant: ParticipantId,
}

impl UsageKey<'_> {
    fn storage_key(&self) -> String {
        format!(
            "rally:usage:{}:{}:{}:{}:{}",
            self.community,
            self.event_id,
            self.action_index,
            self.date.format("%Y-%m-%d"),
            self.participant
        )
    }
}

/// Typed state store.
#[derive(Clone)]
pub struct EventStore {
    repo: Arc<TimedStateRepository>,
}

impl EventStore {
    /// Wraps `repo`, bounding each call by `timeout`.
    #[must_use]
    pub fn new(repo: Arc<dyn StateRepository>, timeout: Duration) -> Self {
        Self {
            repo: Arc::new(TimedStateRepository::new(repo, timeout)),
        }
    }

    fn active_key(community: CommunityId) -> String {
        format!("rally:active:{community}")
    }

    fn history_key(community: CommunityId) -> String {
        format!("rally:history:{community}")
    }

    /// The community's running event, if any.
    ///
    /// # Errors
    ///
    /// Returns a persistence or decoding error.
    pub async fn load_active(
        &self,
        community: CommunityId,
    ) -> Result<Option<ActiveEventState>, EngineError> {
        load_typed(self.repo.as_ref(), &Self::active_key(community)).await
    }

    /// Stores `state` as the community's running event.
    ///
    /// # Errors
    ///
    /// Returns a persistence or encoding error.
    pub async fn save_active(&self, state: &ActiveEventState) -> Result<(), EngineError> {
        save_typed(self.repo.as_ref(), &Self::active_key(state.community), state).await
    }

    /// Removes the community's running event.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn clear_active(&self, community: CommunityId) -> Result<(), EngineError> {
        self.repo.delete_state(&Self::active_key(community)).await
    }

    /// Finish times of every definition that has run in the community.
    ///
    /// # Errors
    ///
    /// Returns a persistence or decoding error.
    pub async fn history(&self, community: CommunityId) -> Result<FinishHistory, EngineError> {
        Ok(load_typed(self.repo.as_ref(), &Self::history_key(community))
            .await?
            .unwrap_or_default())
    }

    /// When `definition_id` last finished in the community.
    ///
    /// # Errors
    ///
    /// Returns a persistence or decoding error.
    pub async fn last_finished(
        &self,
        community: CommunityId,
        definition_id: &str,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        Ok(self.history(community).await?.get(definition_id).copied())
    }

    /// Records that `definition_id` finished at `at`, starting its cooldown.
    ///
    /// # Errors
    ///
    /// Returns a persistence or encoding error.
    pub async fn record_finished(
        &self,
        community: CommunityId,
        definition_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut history = self.history(community).await?;
        history.insert(definition_id.to_owned(), at);
        save_typed(self.repo.as_ref(), &Self::history_key(community), &history).await
    }

    /// Executions recorded under `key`; zero when none.
    ///
    /// # Errors
    ///
    /// Returns a persistence or decoding error.
    pub async fn action_usage(&self, key: &UsageKey<'_>) -> Result<u32, EngineError> {
        Ok(load_typed(self.repo.as_ref(), &key.storage_key())
            .await?
            .unwrap_or(0))
    }

    /// Overwrites the counter under `key`.
    ///
    /// # Errors
    ///
    /// Returns a persistence or encoding error.
    pub async fn set_action_usage(&self, key: &UsageKey<'_>, count: u32) -> Result<(), EngineError> {
        save_typed(self.repo.as_ref(), &key.storage_key(), &count).await
    }
}
