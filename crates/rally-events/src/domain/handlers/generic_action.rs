//! Generic action events: a configured menu of paid actions.
//!
//! The handler only counts executions. Costs, daily limits and reward rolls
//! are one transaction in the engine because they touch the ledger.

use std::collections::BTreeMap;

use rally_core::error::EngineError;
use rally_core::ids::ParticipantId;
use rally_core::rng::DeterministicRng;
use rally_registry::domain::definition::{ActionDef, EventDefinition, EventKind};
use rally_rewards::domain::plan::{Grant, RewardPlan, RewardReason};
use serde::{Deserialize, Serialize};

use super::{Advance, Progress, TypeHandler};

/// Generic action sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericActionState {
    /// Executions across all participants.
    pub executions: u64,
}

/// The rewards one execution rolled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolledRewards {
    /// Grants that landed, in reward order.
    pub grants: Vec<Grant>,
    /// The first configured miss text among rolls that failed.
    pub miss_message: Option<String>,
}

/// Generic action handler.
#[derive(Debug, Clone, Copy)]
pub struct GenericActionHandler;

impl GenericActionHandler {
    /// Rolls each of the action's rewards independently against its rate.
    #[must_use]
    pub fn roll_rewards(
        event_id: &str,
        action_index: usize,
        action: &ActionDef,
        participant: ParticipantId,
        rng: &mut dyn DeterministicRng,
    ) -> RolledRewards {
        let mut rolled = RolledRewards::default();
        for weighted in &action.rewards {
            if weighted.rate < 1.0 && rng.next_f64() >= weighted.rate {
                if rolled.miss_message.is_none() {
                    rolled.miss_message.clone_from(&weighted.fail_message);
                }
                continue;
            }
            let grant = Grant::roll(
                &weighted.reward,
                participant,
                RewardReason::Action {
                    event_id: event_id.to_owned(),
                    action_index,
                },
                rng,
            );
            if !grant.is_empty() {
                rolled.grants.push(grant);
            }
        }
        rolled
    }
}

impl TypeHandler for GenericActionHandler {
    type State = GenericActionState;

    fn setup(definition: &EventDefinition) -> Result<GenericActionState, EngineError> {
        match definition.kind {
            EventKind::GenericAction { .. } => Ok(GenericActionState { executions: 0 }),
            _ => Err(EngineError::Invariant(format!(
                "{} is not a generic action event",
                definition.id
            ))),
        }
    }

    fn on_contribution(state: &GenericActionState, amount: u64) -> (GenericActionState, u64) {
        let next = GenericActionState {
            executions: state.executions.saturating_add(amount),
        };
        (next, amount)
    }

    fn check_advance(_state: &GenericActionState) -> Advance {
        Advance::Active
    }

    fn progress(_state: &GenericActionState) -> Option<Progress> {
        None
    }

    fn finalize(
        _state: &GenericActionState,
        definition: &EventDefinition,
        _totals: &BTreeMap<ParticipantId, u64>,
        _rng: &mut dyn DeterministicRng,
    ) -> RewardPlan {
        RewardPlan::empty(RewardReason::EventEnd {
            event_id: definition.id.clone(),
            completed: true,
        })
    }
}
