//! A participant's quests for one event.

use chrono::NaiveDate;
use rally_core::rng::{DeterministicRng, sample_indices};
use rally_registry::domain::definition::{QuestDef, QuestPools, RewardSpec};
use serde::{Deserialize, Serialize};

/// How long a quest stays assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    /// Replaced at the next local day.
    Daily,
    /// Kept for the event's lifetime.
    Fixed,
}

/// One assigned quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Quest id from the definition.
    pub quest_id: String,
    /// Daily or fixed.
    pub kind: QuestKind,
    /// Action type that advances the quest.
    pub action_type: String,
    /// Progress so far, never above `target`.
    pub progress: u64,
    /// Progress needed.
    pub target: u64,
    /// Whether `progress` reached `target`.
    pub completed: bool,
    /// Whether the reward was handed out. Implies `completed`.
    pub claimed: bool,
    /// Local date the quest was assigned.
    pub assigned_date: NaiveDate,
    /// Granted on claim.
    pub reward: RewardSpec,
}

impl Quest {
    fn assign(def: &QuestDef, kind: QuestKind, date: NaiveDate) -> Self {
        Self {
            quest_id: def.id.clone(),
            kind,
            action_type: def.action_type.clone(),
            progress: 0,
            target: def.target,
            completed: false,
            claimed: false,
            assigned_date: date,
            reward: def.reward.clone(),
        }
    }

    /// Adds `amount` clamped to the target. Returns `true` when this call
    /// completed the quest.
    fn advance(&mut self, amount: u64) -> bool {
        if self.completed {
            return false;
        }
        self.progress = self.progress.saturating_add(amount).min(self.target);
        self.completed = self.progress >= self.target;
        self.completed
    }
}

/// Counts over a quest book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestStats {
    /// Quests currently assigned.
    pub assigned: usize,
    /// Quests completed, claimed or not.
    pub completed: usize,
    /// Quests claimed.
    pub claimed: usize,
}

/// Everything one participant holds for one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestBook {
    /// Local date of the last daily draw.
    pub last_daily_date: Option<NaiveDate>,
    /// Assigned quests, daily first.
    pub quests: Vec<Quest>,
}

impl QuestBook {
    /// Brings the book up to date for `today`.
    ///
    /// On a new day every daily quest is dropped, claimed or not, and
    /// `daily_count` fresh ones are drawn from the pool without replacement.
    /// Fixed quests missing from the book are added. Returns whether anything
    /// changed.
    pub fn refresh(
        &mut self,
        pools: &QuestPools,
        today: NaiveDate,
        rng: &mut dyn DeterministicRng,
    ) -> bool {
        let mut changed = false;

        if self.last_daily_date != Some(today) {
            self.quests.retain(|q| q.kind != QuestKind::Daily);
            let drawn = sample_indices(rng, pools.daily_pool.len(), pools.daily_count);
            let daily = drawn
                .into_iter()
                .map(|i| Quest::assign(&pools.daily_pool[i], QuestKind::Daily, today));
            self.quests.splice(0..0, daily);
            self.last_daily_date = Some(today);
            changed = true;
        }

        for def in &pools.fixed {
            let held = self
                .quests
                .iter()
                .any(|q| q.kind == QuestKind::Fixed && q.quest_id == def.id);
            if !held {
                self.quests.push(Quest::assign(def, QuestKind::Fixed, today));
                changed = true;
            }
        }
        changed
    }

    /// Adds progress to every open quest of `action_type`. Daily quests from
    /// an earlier day no longer count. Returns the quests this call completed.
    pub fn record(&mut self, action_type: &str, amount: u64, today: NaiveDate) -> Vec<Quest> {
        self.quests
            .iter_mut()
            .filter(|q| q.action_type == action_type)
            .filter(|q| q.kind == QuestKind::Fixed || q.assigned_date == today)
            .filter_map(|q| q.advance(amount).then(|| q.clone()))
            .collect()
    }

    /// The quest with `quest_id`, if assigned.
    pub fn find_mut(&mut self, quest_id: &str) -> Option<&mut Quest> {
        self.quests.iter_mut().find(|q| q.quest_id == quest_id)
    }

    /// Assigned, completed and claimed counts.
    #[must_use]
    pub fn stats(&self) -> QuestStats {
        QuestStats {
            assigned: self.quests.len(),
            completed: self.quests.iter().filter(|q| q.completed).count(),
            claimed: self.quests.iter().filter(|q| q.claimed).count(),
        }
    }
}
