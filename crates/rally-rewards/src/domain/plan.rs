//! Reward plans: computed grant lists with an audit reason on every grant.

use std::fmt;

use rally_core::ids::ParticipantId;
use rally_core::rng::DeterministicRng;
use rally_registry::domain::definition::RewardSpec;
use serde::{Deserialize, Serialize};

/// End-of-event ranking tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Top contributor.
    First,
    /// Runner-up.
    Second,
    /// Third place.
    Third,
    /// Every contributor on success.
    Participation,
    /// Every contributor when the goal was missed.
    Fail,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
            Self::Participation => "participation",
            Self::Fail => "fail",
        };
        f.write_str(label)
    }
}

/// Why a grant was made. Rendered as the ledger reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardReason {
    /// A community milestone was crossed.
    Milestone {
        /// Event definition id.
        event_id: String,
        /// Threshold percentage.
        percent: u32,
    },
    /// An event ended; plan-level reason for end-of-event payouts.
    EventEnd {
        /// Event definition id.
        event_id: String,
        /// Whether the goal was reached.
        completed: bool,
    },
    /// A single end-of-event tier payout.
    EventTier {
        /// Event definition id.
        event_id: String,
        /// The tier paid.
        tier: Tier,
    },
    /// A quest reward was claimed.
    Quest {
        /// Event definition id.
        event_id: String,
        /// Quest id.
        quest_id: String,
    },
    /// A generic action paid out.
    Action {
        /// Event definition id.
        event_id: String,
        /// Index of the action.
        action_index: usize,
    },
    /// An operator granted currency by hand.
    Operator,
}

impl fmt::Display for RewardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Milestone { event_id, percent } => write!(f, "milestone:{event_id}:{percent}"),
            Self::EventEnd {
                event_id,
                completed,
            } => {
                let outcome = if *completed { "success" } else { "fail" };
                write!(f, "event_end:{event_id}:{outcome}")
            }
            Self::EventTier { event_id, tier } => write!(f, "event:{event_id}:{tier}"),
            Self::Quest { event_id, quest_id } => write!(f, "quest:{event_id}:{quest_id}"),
            Self::Action {
                event_id,
                action_index,
            } => write!(f, "action:{event_id}:{action_index}"),
            Self::Operator => f.write_str("operator:grant"),
        }
    }
}

/// A concrete quantity of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    /// Item key.
    pub key: String,
    /// Quantity.
    pub qty: u64,
}

/// Everything one participant receives for one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Recipient.
    pub participant: ParticipantId,
    /// Currency credited.
    pub currency: u64,
    /// Items granted.
    pub items: Vec<ItemGrant>,
    /// Audit reason.
    pub reason: RewardReason,
}

impl Grant {
    /// Rolls a reward spec into a concrete grant. Item quantities are drawn
    /// uniformly in `[min, max]`; items that roll zero are dropped.
    pub fn roll(
        spec: &RewardSpec,
        participant: ParticipantId,
        reason: RewardReason,
        rng: &mut dyn DeterministicRng,
    ) -> Self {
        let items = spec
            .items
            .iter()
            .filter_map(|roll| {
                let qty = roll_quantity(roll.min, roll.max, rng);
                (qty > 0).then(|| ItemGrant {
                    key: roll.key.clone(),
                    qty,
                })
            })
            .collect();
        Self {
            participant,
            currency: spec.currency,
            items,
            reason,
        }
    }

    /// Whether the grant moves nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.currency == 0 && self.items.is_empty()
    }
}

fn roll_quantity(min: u64, max: u64, rng: &mut dyn DeterministicRng) -> u64 {
    if min >= max {
        return min;
    }
    let hi = u32::try_from(max).unwrap_or(u32::MAX);
    let lo = u32::try_from(min).unwrap_or(u32::MAX).min(hi);
    u64::from(rng.next_u32_range(lo, hi))
}

/// An ordered, precomputed set of grants.
///
/// Bonus-related fields are explicit and always initialized so consumers
/// never need to guess whether a bonus applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPlan {
    /// What triggered the plan.
    pub reason: RewardReason,
    /// Grants in application order.
    pub grants: Vec<Grant>,
    /// The highest-ranked contributor, when the plan ranks contributors.
    pub top_contributor: Option<ParticipantId>,
}

impl RewardPlan {
    /// A plan that grants nothing.
    #[must_use]
    pub fn empty(reason: RewardReason) -> Self {
        Self {
            reason,
            grants: Vec::new(),
            top_contributor: None,
        }
    }

    /// Pays the same spec to every recipient, in the order given.
    pub fn uniform(
        reason: RewardReason,
        spec: &RewardSpec,
        recipients: impl IntoIterator<Item = ParticipantId>,
        rng: &mut dyn DeterministicRng,
    ) -> Self {
        let grants = recipients
            .into_iter()
            .map(|p| Grant::roll(spec, p, reason.clone(), rng))
            .filter(|g| !g.is_empty())
            .collect();
        Self {
            reason,
            grants,
            top_contributor: None,
        }
    }

    /// Appends a grant unless it is empty.
    pub fn push(&mut self, grant: Grant) {
        if !grant.is_empty() {
            self.grants.push(grant);
        }
    }

    /// Whether the plan grants nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Total currency across all grants.
    #[must_use]
    pub fn total_currency(&self) -> u64 {
        self.grants.iter().map(|g| g.currency).sum()
    }
}
