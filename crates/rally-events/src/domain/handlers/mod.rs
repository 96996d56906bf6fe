//! Type handlers: the per-event-type state machines.
//!
//! A handler never touches persistence. It takes the current sub-state and
//! returns the next one, so the aggregator can apply, evaluate milestones, and
//! persist under a single lock.

pub mod collection;
pub mod generic_action;
pub mod raid;

use std::collections::BTreeMap;

use rally_core::error::EngineError;
use rally_core::ids::ParticipantId;
use rally_core::rng::DeterministicRng;
use rally_registry::domain::definition::EventDefinition;
use rally_rewards::domain::plan::{Grant, RewardPlan, RewardReason, Tier};
use serde::{Deserialize, Serialize};

pub use collection::{CollectionHandler, CollectionState};
pub use generic_action::{GenericActionHandler, GenericActionState, RolledRewards};
pub use raid::{RaidHandler, RaidState};

/// Where a run stands after its latest update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advance {
    /// Still running.
    Active,
    /// The shared goal was reached.
    Completed,
    /// The run can no longer succeed.
    Failed,
}

/// Progress toward a shared goal, in goal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Units achieved so far.
    pub current: u64,
    /// Units needed.
    pub goal: u64,
}

impl Progress {
    /// Whether `percent` of the goal has been reached.
    #[must_use]
    pub fn reached(&self, percent: u32) -> bool {
        u128::from(self.current) * 100 >= u128::from(self.goal) * u128::from(percent)
    }

    /// Whole percent complete, rounded down.
    #[must_use]
    pub fn percent(&self) -> u64 {
        if self.goal == 0 {
            return 100;
        }
        let pct = u128::from(self.current) * 100 / u128::from(self.goal);
        u64::try_from(pct).unwrap_or(u64::MAX)
    }
}

/// Behavior of one event type.
pub trait TypeHandler {
    /// The type-specific sub-state.
    type State: Clone;

    /// Builds the initial sub-state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Invariant` if `definition` is of another type.
    fn setup(definition: &EventDefinition) -> Result<Self::State, EngineError>;

    /// Applies a contribution, returning the next state and the amount
    /// actually applied.
    fn on_contribution(state: &Self::State, amount: u64) -> (Self::State, u64);

    /// Whether the run should keep going.
    fn check_advance(state: &Self::State) -> Advance;

    /// Progress toward the goal, if the type has one.
    fn progress(state: &Self::State) -> Option<Progress>;

    /// Computes end-of-run rewards.
    fn finalize(
        state: &Self::State,
        definition: &EventDefinition,
        totals: &BTreeMap<ParticipantId, u64>,
        rng: &mut dyn DeterministicRng,
    ) -> RewardPlan;
}

/// Type-specific state of a run, persisted alongside the common fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubState {
    /// Raid hp pool.
    Raid(RaidState),
    /// Collection countdown.
    CollectionQuest(CollectionState),
    /// Action execution counter.
    GenericAction(GenericActionState),
}

impl SubState {
    /// Initial sub-state for `definition`'s type.
    ///
    /// # Errors
    ///
    /// Propagates the handler's setup error.
    pub fn setup(definition: &EventDefinition) -> Result<Self, EngineError> {
        use rally_registry::domain::definition::EventKind;
        Ok(match definition.kind {
            EventKind::Raid { .. } => Self::Raid(RaidHandler::setup(definition)?),
            EventKind::CollectionQuest { .. } => {
                Self::CollectionQuest(CollectionHandler::setup(definition)?)
            }
            EventKind::GenericAction { .. } => {
                Self::GenericAction(GenericActionHandler::setup(definition)?)
            }
        })
    }

    /// Applies a contribution through the matching handler.
    #[must_use]
    pub fn on_contribution(&self, amount: u64) -> (Self, u64) {
        match self {
            Self::Raid(s) => {
                let (next, applied) = RaidHandler::on_contribution(s, amount);
                (Self::Raid(next), applied)
            }
            Self::CollectionQuest(s) => {
                let (next, applied) = CollectionHandler::on_contribution(s, amount);
                (Self::CollectionQuest(next), applied)
            }
            Self::GenericAction(s) => {
                let (next, applied) = GenericActionHandler::on_contribution(s, amount);
                (Self::GenericAction(next), applied)
            }
        }
    }

    /// Whether the run should keep going.
    #[must_use]
    pub fn check_advance(&self) -> Advance {
        match self {
            Self::Raid(s) => RaidHandler::check_advance(s),
            Self::CollectionQuest(s) => CollectionHandler::check_advance(s),
            Self::GenericAction(s) => GenericActionHandler::check_advance(s),
        }
    }

    /// Progress toward the goal, if any.
    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        match self {
            Self::Raid(s) => RaidHandler::progress(s),
            Self::CollectionQuest(s) => CollectionHandler::progress(s),
            Self::GenericAction(s) => GenericActionHandler::progress(s),
        }
    }

    /// Computes end-of-run rewards.
    pub fn finalize(
        &self,
        definition: &EventDefinition,
        totals: &BTreeMap<ParticipantId, u64>,
        rng: &mut dyn DeterministicRng,
    ) -> RewardPlan {
        match self {
            Self::Raid(s) => RaidHandler::finalize(s, definition, totals, rng),
            Self::CollectionQuest(s) => CollectionHandler::finalize(s, definition, totals, rng),
            Self::GenericAction(s) => GenericActionHandler::finalize(s, definition, totals, rng),
        }
    }
}

/// Contributors with a positive total, best first. Ties go to the lower
/// participant id.
#[must_use]
pub fn rank(totals: &BTreeMap<ParticipantId, u64>) -> Vec<(ParticipantId, u64)> {
    let mut ranked: Vec<(ParticipantId, u64)> = totals
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .map(|(p, amount)| (*p, *amount))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// End-of-run plan shared by the goal-based types.
///
/// On success every contributor gets `participation` and the top three get
/// their tier reward as a separate grant. On failure every contributor gets
/// `fail`.
pub(crate) fn tiered_plan(
    definition: &EventDefinition,
    totals: &BTreeMap<ParticipantId, u64>,
    completed: bool,
    rng: &mut dyn DeterministicRng,
) -> RewardPlan {
    let ranked = rank(totals);
    let tables = &definition.rewards;
    let tier_reason = |tier| RewardReason::EventTier {
        event_id: definition.id.clone(),
        tier,
    };
    let mut plan = RewardPlan::empty(RewardReason::EventEnd {
        event_id: definition.id.clone(),
        completed,
    });

    if !completed {
        for (participant, _) in &ranked {
            plan.push(Grant::roll(
                &tables.fail,
                *participant,
                tier_reason(Tier::Fail),
                rng,
            ));
        }
        return plan;
    }

    for (participant, _) in &ranked {
        plan.push(Grant::roll(
            &tables.participation,
            *participant,
            tier_reason(Tier::Participation),
            rng,
        ));
    }
    let podium = [
        (Tier::First, &tables.first),
        (Tier::Second, &tables.second),
        (Tier::Third, &tables.third),
    ];
    for ((participant, _), (tier, spec)) in ranked.iter().zip(podium) {
        plan.push(Grant::roll(spec, *participant, tier_reason(tier), rng));
    }
    plan.top_contributor = ranked.first().map(|(p, _)| *p);
    plan
}
