//! Event definition schema.
//!
//! One validated shape per event type: type parameters live inline under
//! `kind`, tagged by `type`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::schedule::Schedule;

/// A static, config-driven description of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    /// Unique identifier. Filled from the registry map key when omitted.
    #[serde(default)]
    pub id: String,
    /// Human-readable name used in announcements.
    #[serde(default)]
    pub name: String,
    /// Higher priorities are considered first by the scheduler.
    #[serde(default)]
    pub priority: i32,
    /// When the event may start.
    pub schedule: Schedule,
    /// Event shape and its parameters.
    pub kind: EventKind,
    /// Percentage-of-goal thresholds that pay every participant once.
    #[serde(default)]
    pub milestones: Vec<MilestoneDef>,
    /// End-of-event reward tables.
    #[serde(default)]
    pub rewards: RewardTables,
    /// Announcement texts.
    #[serde(default)]
    pub messages: Messages,
    /// Quest pools offered while the event runs.
    #[serde(default)]
    pub quests: QuestPools,
    /// Named multipliers other systems read while a run is active, such as
    /// `catch_rate: 1.5`.
    #[serde(default)]
    pub effects: BTreeMap<String, f64>,
}

/// The polymorphic event shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Shared HP pool knocked down by contributions.
    Raid {
        /// Starting (and maximum) HP.
        hp_goal: u64,
    },
    /// Shared countdown of items to collect.
    CollectionQuest {
        /// Quantity to collect.
        goal: u64,
    },
    /// Data-driven list of paid actions with random rewards.
    GenericAction {
        /// Available actions, addressed by index.
        actions: Vec<ActionDef>,
    },
}

impl EventKind {
    /// Short type label for logs and status views.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Raid { .. } => "raid",
            Self::CollectionQuest { .. } => "collection_quest",
            Self::GenericAction { .. } => "generic_action",
        }
    }
}

/// One paid action of a `GenericAction` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    /// Display label.
    pub label: String,
    /// What the participant pays.
    #[serde(default)]
    pub cost: ActionCost,
    /// Independently rolled rewards.
    #[serde(default)]
    pub rewards: Vec<WeightedReward>,
    /// Executions allowed per participant per local day; `0` is unlimited.
    #[serde(default)]
    pub daily_limit: u32,
    /// Shown to the participant when at least one reward landed.
    #[serde(default)]
    pub message: Option<String>,
    /// Announced to the community when at least one reward landed.
    /// `{participant}` and `{rewards}` are substituted.
    #[serde(default)]
    pub public_message: Option<String>,
}

/// The price of one action execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionCost {
    /// Currency debited.
    #[serde(default)]
    pub currency: u64,
    /// Item consumed.
    #[serde(default)]
    pub item: Option<ItemAmount>,
    /// Quantity taken from any items of one type, in member order.
    #[serde(default)]
    pub item_type: Option<ItemTypeAmount>,
}

/// A quantity drawn from any mix of the items that make up one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeAmount {
    /// Type name shown in rejections, such as `fish`.
    pub name: String,
    /// Item keys belonging to the type. Consumed in this order.
    pub members: Vec<String>,
    /// Total quantity.
    pub qty: u64,
}

/// A fixed quantity of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAmount {
    /// Item key.
    pub key: String,
    /// Quantity.
    pub qty: u64,
}

/// A reward that pays out with probability `rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedReward {
    /// Chance in `[0, 1]` that this reward is granted.
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// What is granted on success.
    #[serde(flatten)]
    pub reward: RewardSpec,
    /// Told to the participant when this roll misses and nothing landed.
    #[serde(default)]
    pub fail_message: Option<String>,
}

fn default_rate() -> f64 {
    1.0
}

/// A bundle of currency and item rolls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSpec {
    /// Currency credited.
    #[serde(default)]
    pub currency: u64,
    /// Items granted, each with a quantity rolled in `[min, max]`.
    #[serde(default)]
    pub items: Vec<ItemRoll>,
}

impl RewardSpec {
    /// Whether this spec grants nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.currency == 0 && self.items.is_empty()
    }
}

/// An item quantity rolled uniformly in `[min, max]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRoll {
    /// Item key.
    pub key: String,
    /// Smallest quantity.
    pub min: u64,
    /// Largest quantity.
    pub max: u64,
}

/// A community milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDef {
    /// Threshold in percent of the goal, `1..=100`.
    pub percent: u32,
    /// Granted to every participant known when the threshold is crossed.
    #[serde(flatten)]
    pub reward: RewardSpec,
    /// Optional announcement.
    #[serde(default)]
    pub announcement: Option<String>,
}

/// End-of-event reward tables.
///
/// On success every contributor receives `participation`; the top three also
/// receive `first`, `second`, or `third` on top. On failure every contributor
/// receives `fail` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTables {
    /// Extra for the top contributor.
    #[serde(default)]
    pub first: RewardSpec,
    /// Extra for the runner-up.
    #[serde(default)]
    pub second: RewardSpec,
    /// Extra for third place.
    #[serde(default)]
    pub third: RewardSpec,
    /// Paid to every contributor on success.
    #[serde(default)]
    pub participation: RewardSpec,
    /// Paid to every contributor when the goal was not reached.
    #[serde(default)]
    pub fail: RewardSpec,
}

/// Announcement texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    /// Sent when the event starts.
    #[serde(default)]
    pub start: Option<String>,
    /// Sent when the event ends.
    #[serde(default)]
    pub end: Option<String>,
}

fn default_daily_count() -> usize {
    3
}

/// Quests offered to participants during the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestPools {
    /// Pool daily quests are drawn from.
    #[serde(default)]
    pub daily_pool: Vec<QuestDef>,
    /// Number of daily quests drawn per participant per day.
    #[serde(default = "default_daily_count")]
    pub daily_count: usize,
    /// Quests assigned once for the whole event.
    #[serde(default)]
    pub fixed: Vec<QuestDef>,
}

impl Default for QuestPools {
    fn default() -> Self {
        Self {
            daily_pool: Vec::new(),
            daily_count: default_daily_count(),
            fixed: Vec::new(),
        }
    }
}

/// A quest template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestDef {
    /// Quest identifier, unique within the event.
    pub id: String,
    /// Action type whose progress counts toward this quest.
    pub action_type: String,
    /// Progress needed to complete.
    pub target: u64,
    /// Description shown to participants.
    #[serde(default)]
    pub description: String,
    /// Granted on claim.
    #[serde(default)]
    pub reward: RewardSpec,
}

impl EventDefinition {
    /// Checks every rule the schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_owned());
        }
        let schedule = &self.schedule;
        if !schedule.probability.is_finite() || schedule.probability < 0.0 {
            return Err(format!(
                "probability must be a non-negative number, got {}",
                schedule.probability
            ));
        }
        if schedule.duration_minutes == 0 {
            return Err("duration_minutes must be greater than zero".to_owned());
        }
        if let Some(day) = schedule.days.iter().find(|d| **d > 6) {
            return Err(format!("day {day} is out of range 0..=6"));
        }
        if schedule.time_ranges.is_empty() {
            return Err("time_ranges must not be empty".to_owned());
        }

        match &self.kind {
            EventKind::Raid { hp_goal } if *hp_goal == 0 => {
                return Err("raid hp_goal must be greater than zero".to_owned());
            }
            EventKind::CollectionQuest { goal } if *goal == 0 => {
                return Err("collection goal must be greater than zero".to_owned());
            }
            EventKind::GenericAction { actions } => {
                if actions.is_empty() {
                    return Err("generic_action needs at least one action".to_owned());
                }
                for (index, action) in actions.iter().enumerate() {
                    if let Some(item) = &action.cost.item
                        && item.qty == 0
                    {
                        return Err(format!("action {index} item cost must be positive"));
                    }
                    if let Some(kind) = &action.cost.item_type {
                        if kind.qty == 0 {
                            return Err(format!("action {index} item type cost must be positive"));
                        }
                        if kind.members.is_empty() {
                            return Err(format!(
                                "action {index} item type {} has no member items",
                                kind.name
                            ));
                        }
                    }
                    for reward in &action.rewards {
                        if !(0.0..=1.0).contains(&reward.rate) {
                            return Err(format!(
                                "action {index} reward rate {} is outside [0, 1]",
                                reward.rate
                            ));
                        }
                        validate_spec(&reward.reward)
                            .map_err(|e| format!("action {index}: {e}"))?;
                    }
                }
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        for milestone in &self.milestones {
            if !(1..=100).contains(&milestone.percent) {
                return Err(format!(
                    "milestone percent {} is outside 1..=100",
                    milestone.percent
                ));
            }
            if !seen.insert(milestone.percent) {
                return Err(format!("milestone percent {} is repeated", milestone.percent));
            }
            validate_spec(&milestone.reward)?;
        }
        if !self.milestones.is_empty() && matches!(self.kind, EventKind::GenericAction { .. }) {
            return Err("generic_action events have no goal for milestones".to_owned());
        }

        let tables = &self.rewards;
        for spec in [
            &tables.first,
            &tables.second,
            &tables.third,
            &tables.participation,
            &tables.fail,
        ] {
            validate_spec(spec)?;
        }

        if let Some((name, value)) = self
            .effects
            .iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(format!("effect {name} must be a non-negative number, got {value}"));
        }

        let mut quest_ids = HashSet::new();
        for quest in self.quests.daily_pool.iter().chain(&self.quests.fixed) {
            if quest.target == 0 {
                return Err(format!("quest {} target must be greater than zero", quest.id));
            }
            if !quest_ids.insert(quest.id.as_str()) {
                return Err(format!("quest id {} is repeated", quest.id));
            }
            validate_spec(&quest.reward)?;
        }
        Ok(())
    }
}

fn validate_spec(spec: &RewardSpec) -> Result<(), String> {
    for roll in &spec.items {
        if roll.key.trim().is_empty() {
            return Err("reward item key must not be empty".to_owned());
        }
        if roll.min > roll.max {
            return Err(format!(
                "reward item {} has min {} greater than max {}",
                roll.key, roll.min, roll.max
            ));
        }
        if roll.max > u64::from(u32::MAX) {
            return Err(format!(
                "reward item {} max {} exceeds {}",
                roll.key,
                roll.max,
                u32::MAX
            ));
        }
    }
    Ok(())
}
