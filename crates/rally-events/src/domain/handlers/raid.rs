//! Raid: a shared hp pool knocked down by contributions.

use std::collections::BTreeMap;

use rally_core::error::EngineError;
use rally_core::ids::ParticipantId;
use rally_core::rng::DeterministicRng;
use rally_registry::domain::definition::{EventDefinition, EventKind};
use rally_rewards::domain::plan::RewardPlan;
use serde::{Deserialize, Serialize};

use super::{Advance, Progress, TypeHandler, tiered_plan};

/// Raid sub-state. `hp_current` never drops below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidState {
    /// Remaining hp.
    pub hp_current: u64,
    /// Starting hp.
    pub hp_max: u64,
}

/// Raid handler.
#[derive(Debug, Clone, Copy)]
pub struct RaidHandler;

impl TypeHandler for RaidHandler {
    type State = RaidState;

    fn setup(definition: &EventDefinition) -> Result<RaidState, EngineError> {
        match definition.kind {
            EventKind::Raid { hp_goal } => Ok(RaidState {
                hp_current: hp_goal,
                hp_max: hp_goal,
            }),
            _ => Err(EngineError::Invariant(format!(
                "{} is not a raid",
                definition.id
            ))),
        }
    }

    fn on_contribution(state: &RaidState, amount: u64) -> (RaidState, u64) {
        let applied = amount.min(state.hp_current);
        let next = RaidState {
            hp_current: state.hp_current - applied,
            ..*state
        };
        (next, applied)
    }

    fn check_advance(state: &RaidState) -> Advance {
        if state.hp_current == 0 {
            Advance::Completed
        } else {
            Advance::Active
        }
    }

    fn progress(state: &RaidState) -> Option<Progress> {
        Some(Progress {
            current: state.hp_max - state.hp_current,
            goal: state.hp_max,
        })
    }

    fn finalize(
        state: &RaidState,
        definition: &EventDefinition,
        totals: &BTreeMap<ParticipantId, u64>,
        rng: &mut dyn DeterministicRng,
    ) -> RewardPlan {
        tiered_plan(definition, totals, state.hp_current == 0, rng)
    }
}
