//! Collection quest: a shared countdown of items to gather.

use std::collections::BTreeMap;

use rally_core::error::EngineError;
use rally_core::ids::ParticipantId;
use rally_core::rng::DeterministicRng;
use rally_registry::domain::definition::{EventDefinition, EventKind};
use rally_rewards::domain::plan::RewardPlan;
use serde::{Deserialize, Serialize};

use super::{Advance, Progress, TypeHandler, tiered_plan};

/// Collection sub-state. `remaining` never drops below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    /// Quantity to collect.
    pub goal: u64,
    /// Quantity still missing.
    pub remaining: u64,
}

/// Collection quest handler.
#[derive(Debug, Clone, Copy)]
pub struct CollectionHandler;

impl TypeHandler for CollectionHandler {
    type State = CollectionState;

    fn setup(definition: &EventDefinition) -> Result<CollectionState, EngineError> {
        match definition.kind {
            EventKind::CollectionQuest { goal } => Ok(CollectionState {
                goal,
                remaining: goal,
            }),
            _ => Err(EngineError::Invariant(format!(
                "{} is not a collection quest",
                definition.id
            ))),
        }
    }

    fn on_contribution(state: &CollectionState, amount: u64) -> (CollectionState, u64) {
        let applied = amount.min(state.remaining);
        let next = CollectionState {
            remaining: state.remaining - applied,
            ..*state
        };
        (next, applied)
    }

    fn check_advance(state: &CollectionState) -> Advance {
        if state.remaining == 0 {
            Advance::Completed
        } else {
            Advance::Active
        }
    }

    fn progress(state: &CollectionState) -> Option<Progress> {
        Some(Progress {
            current: state.goal - state.remaining,
            goal: state.goal,
        })
    }

    fn finalize(
        state: &CollectionState,
        definition: &EventDefinition,
        totals: &BTreeMap<ParticipantId, u64>,
        rng: &mut dyn DeterministicRng,
    ) -> RewardPlan {
        tiered_plan(definition, totals, state.remaining == 0, rng)
    }
}
