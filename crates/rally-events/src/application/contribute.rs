//! Contribution aggregation and milestone payout.

use rally_core::error::{EngineError, Rejection};
use rally_core::ids::{CommunityId, ParticipantId};
use rally_registry::domain::definition::EventDefinition;
use rally_rewards::domain::plan::{RewardPlan, RewardReason};
use tracing::{info, instrument};

use super::engine::EventEngine;
use crate::domain::milestones::{self, MilestoneHit};
use crate::domain::outcomes::ContributionOutcome;
use crate::domain::state::ActiveEventState;

impl EventEngine {
    /// Applies a participant's contribution to the running event.
    ///
    /// Safe to call concurrently: contributions to one community are
    /// serialized, and milestone rewards are paid only after the reached
    /// flags are stored.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; nothing is applied in that case.
    #[instrument(skip(self), fields(%community, %participant))]
    pub async fn contribute(
        &self,
        community: CommunityId,
        event_id: &str,
        participant: ParticipantId,
        amount: u64,
    ) -> Result<ContributionOutcome, EngineError> {
        self.apply_progress(community, Some(event_id), Some(participant), amount)
            .await
    }

    /// Adds operator progress to whatever event is running. No participant
    /// is credited for it.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; nothing is applied in that case.
    #[instrument(skip(self), fields(%community))]
    pub async fn add_progress(
        &self,
        community: CommunityId,
        amount: u64,
    ) -> Result<ContributionOutcome, EngineError> {
        self.apply_progress(community, None, None, amount).await
    }

    async fn apply_progress(
        &self,
        community: CommunityId,
        event_id: Option<&str>,
        participant: Option<ParticipantId>,
        amount: u64,
    ) -> Result<ContributionOutcome, EngineError> {
        if amount == 0 {
            return Ok(ContributionOutcome::Rejected(Rejection::InvalidAmount));
        }
        let guard = self.locks.lock(&community).await;
        let (mut state, definition) = match self.load_for_update(community, event_id).await? {
            Ok(found) => found,
            Err(rejection) => return Ok(ContributionOutcome::Rejected(rejection)),
        };
        let (applied, hits) = self
            .apply_locked(&mut state, &definition, participant, amount)
            .await?;
        drop(guard);

        self.pay_milestones(community, &definition, &hits).await;
        Ok(ContributionOutcome::Applied {
            applied,
            requested: amount,
            milestones: hits.iter().map(|h| h.percent).collect(),
        })
    }

    /// Runs the handler, updates totals, evaluates milestones and persists.
    /// The caller holds the community lock. On error `state` must be
    /// discarded.
    pub(crate) async fn apply_locked(
        &self,
        state: &mut ActiveEventState,
        definition: &EventDefinition,
        participant: Option<ParticipantId>,
        amount: u64,
    ) -> Result<(u64, Vec<MilestoneHit>), EngineError> {
        let (next, applied) = state.sub_state.on_contribution(amount);
        state.sub_state = next;
        if let Some(participant) = participant {
            state.record(participant, applied);
        }
        let hits = milestones::evaluate(definition, state);
        self.store.save_active(state).await?;
        Ok((applied, hits))
    }

    /// Pays every fired milestone to its recipient snapshot.
    pub(crate) async fn pay_milestones(
        &self,
        community: CommunityId,
        definition: &EventDefinition,
        hits: &[MilestoneHit],
    ) {
        for hit in hits {
            let Some(milestone) = definition
                .milestones
                .iter()
                .find(|m| m.percent == hit.percent)
            else {
                continue;
            };
            let plan = self.with_rng(|rng| {
                RewardPlan::uniform(
                    RewardReason::Milestone {
                        event_id: definition.id.clone(),
                        percent: hit.percent,
                    },
                    &milestone.reward,
                    hit.recipients.iter().copied(),
                    rng,
                )
            });
            let report = self.distributor.distribute(&plan).await;
            info!(
                %community,
                event_id = %definition.id,
                percent = hit.percent,
                recipients = hit.recipients.len(),
                delivered = report.delivered,
                "milestone reached"
            );
            if let Some(text) = &hit.announcement {
                self.notifier().announce(community, text).await;
            }
        }
    }
}
