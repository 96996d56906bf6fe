//! Quest book persistence and the operations on it.
//!
//! A participant's book is read, changed and written back while holding that
//! book's lock. Claim rewards are dispatched after the `claimed` flag is
//! stored and the lock is released.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate};
use rally_core::clock::Clock;
use rally_core::error::{EngineError, Rejection};
use rally_core::ids::{CommunityId, ParticipantId};
use rally_core::locks::KeyedLocks;
use rally_core::repository::{StateRepository, TimedStateRepository, load_typed, save_typed};
use rally_core::rng::DeterministicRng;
use rally_registry::domain::definition::EventDefinition;
use rally_rewards::application::distributor::RewardDistributor;
use rally_rewards::domain::plan::{Grant, RewardReason};
use tracing::{info, instrument, warn};

use crate::domain::book::{Quest, QuestBook, QuestStats};
use crate::domain::outcomes::ClaimOutcome;

fn book_key(community: CommunityId, event_id: &str, participant: ParticipantId) -> String {
    format!("rally:quests:{community}:{event_id}:{participant}")
}

/// Tracks quest books for every participant of every community.
pub struct QuestTracker {
    repo: TimedStateRepository,
    distributor: RewardDistributor,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    rng: Mutex<Box<dyn DeterministicRng>>,
    locks: KeyedLocks<String>,
}

impl QuestTracker {
    /// Creates a tracker. Each storage call is bounded by `persist_timeout`;
    /// the daily boundary is local midnight at `utc_offset`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn StateRepository>,
        persist_timeout: Duration,
        distributor: RewardDistributor,
        clock: Arc<dyn Clock>,
        rng: Box<dyn DeterministicRng>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            repo: TimedStateRepository::new(repository, persist_timeout),
            distributor,
            clock,
            utc_offset,
            rng: Mutex::new(rng),
            locks: KeyedLocks::new(),
        }
    }

    fn today(&self) -> NaiveDate {
        self.clock.today(self.utc_offset)
    }

    async fn load(&self, key: &str) -> Result<QuestBook, EngineError> {
        Ok(load_typed(&self.repo, key).await?.unwrap_or_default())
    }

    /// Assigns today's quests to `participant` for `definition`, drawing a
    /// fresh daily set on a new local day.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; the stored book is unchanged.
    #[instrument(skip(self, definition), fields(%community, event_id = %definition.id, %participant))]
    pub async fn init_quests(
        &self,
        community: CommunityId,
        definition: &EventDefinition,
        participant: ParticipantId,
    ) -> Result<QuestBook, EngineError> {
        let key = book_key(community, &definition.id, participant);
        let _guard = self.locks.lock(&key).await;
        let mut book = self.load(&key).await?;
        let today = self.today();
        let changed = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            book.refresh(&definition.quests, today, rng.as_mut())
        };
        if changed {
            save_typed(&self.repo, &key, &book).await?;
            info!(%today, assigned = book.quests.len(), "quests assigned");
        }
        Ok(book)
    }

    /// Adds `amount` to every open quest of `action_type`. Returns the quests
    /// this update completed.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; no progress is recorded.
    #[instrument(skip(self), fields(%community, %participant))]
    pub async fn update_progress(
        &self,
        community: CommunityId,
        event_id: &str,
        participant: ParticipantId,
        action_type: &str,
        amount: u64,
    ) -> Result<Vec<Quest>, EngineError> {
        if amount == 0 {
            return Ok(Vec::new());
        }
        let key = book_key(community, event_id, participant);
        let _guard = self.locks.lock(&key).await;
        let Some(mut book) = load_typed::<QuestBook>(&self.repo, &key).await? else {
            return Ok(Vec::new());
        };
        let before = book.clone();
        let completed = book.record(action_type, amount, self.today());
        if book != before {
            save_typed(&self.repo, &key, &book).await?;
        }
        for quest in &completed {
            info!(quest_id = %quest.quest_id, "quest completed");
        }
        Ok(completed)
    }

    /// Marks a completed quest as claimed and hands out its reward.
    ///
    /// The claim is stored before the reward is dispatched, so a quest is
    /// never paid twice. A reward that fails to land is logged and reported
    /// through `delivered`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; the quest stays unclaimed.
    #[instrument(skip(self), fields(%community, %participant))]
    pub async fn claim(
        &self,
        community: CommunityId,
        event_id: &str,
        participant: ParticipantId,
        quest_id: &str,
    ) -> Result<ClaimOutcome, EngineError> {
        let key = book_key(community, event_id, participant);
        let guard = self.locks.lock(&key).await;
        let mut book = self.load(&key).await?;
        let Some(quest) = book.find_mut(quest_id) else {
            return Ok(ClaimOutcome::Rejected(Rejection::QuestNotFound {
                quest_id: quest_id.to_owned(),
            }));
        };
        if !quest.completed {
            return Ok(ClaimOutcome::Rejected(Rejection::QuestNotCompleted {
                quest_id: quest_id.to_owned(),
            }));
        }
        if quest.claimed {
            return Ok(ClaimOutcome::Rejected(Rejection::AlreadyClaimed {
                quest_id: quest_id.to_owned(),
            }));
        }
        quest.claimed = true;
        let reward = quest.reward.clone();
        save_typed(&self.repo, &key, &book).await?;
        drop(guard);

        let reason = RewardReason::Quest {
            event_id: event_id.to_owned(),
            quest_id: quest_id.to_owned(),
        };
        let grant = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            Grant::roll(&reward, participant, reason, rng.as_mut())
        };
        let delivered = match self.distributor.apply_grant(&grant).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%quest_id, error = %e, "quest reward failed");
                false
            }
        };
        Ok(ClaimOutcome::Claimed { grant, delivered })
    }

    /// Assigned, completed and claimed counts for one participant's book.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn stats(
        &self,
        community: CommunityId,
        event_id: &str,
        participant: ParticipantId,
    ) -> Result<QuestStats, EngineError> {
        let key = book_key(community, event_id, participant);
        Ok(self.load(&key).await?.stats())
    }
}
