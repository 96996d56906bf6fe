//! Generic action execution.
//!
//! One execution is all-or-nothing from the caller's view: every step that
//! already touched the ledger, inventory or usage counter is compensated
//! when a later step fails.

use rally_core::error::{EngineError, Rejection};
use rally_core::ids::{CommunityId, ParticipantId};
use rally_registry::domain::definition::{ActionCost, EventKind, ItemAmount};
use rally_rewards::application::distributor::GrantJournal;
use rally_rewards::domain::plan::{Grant, RewardReason};
use tracing::{error, info, instrument};

use super::engine::EventEngine;
use super::store::UsageKey;
use crate::domain::handlers::GenericActionHandler;
use crate::domain::outcomes::ActionOutcome;

/// What was taken from the participant for one execution.
#[derive(Debug, Default)]
struct Payment {
    currency: u64,
    items: Vec<ItemAmount>,
}

impl EventEngine {
    /// Executes action `action_index` of the running generic action event
    /// for `participant`.
    ///
    /// # Errors
    ///
    /// Returns a persistence or collaborator error. Every applied step has
    /// been compensated by then.
    #[instrument(skip(self), fields(%community, %participant))]
    pub async fn execute_action(
        &self,
        community: CommunityId,
        event_id: &str,
        participant: ParticipantId,
        action_index: usize,
    ) -> Result<ActionOutcome, EngineError> {
        let guard = self.locks.lock(&community).await;
        let (mut state, definition) = match self.load_for_update(community, Some(event_id)).await? {
            Ok(found) => found,
            Err(rejection) => return Ok(ActionOutcome::Rejected(rejection)),
        };
        let EventKind::GenericAction { actions } = &definition.kind else {
            return Ok(ActionOutcome::Rejected(Rejection::UnsupportedOperation {
                event_id: definition.id.clone(),
                operation: "execute_action",
            }));
        };
        let Some(action) = actions.get(action_index) else {
            return Ok(ActionOutcome::Rejected(Rejection::UnknownAction {
                index: action_index,
            }));
        };

        let usage_key = UsageKey {
            community,
            event_id: &definition.id,
            action_index,
            date: self.clock.today(self.config().utc_offset()),
            participant,
        };
        let used = self.store.action_usage(&usage_key).await?;
        if action.daily_limit > 0 && used >= action.daily_limit {
            return Ok(ActionOutcome::Rejected(Rejection::LimitReached {
                limit: action.daily_limit,
            }));
        }

        let reason = RewardReason::Action {
            event_id: definition.id.clone(),
            action_index,
        }
        .to_string();
        if let Some(rejection) = self.check_cost(participant, &action.cost).await? {
            return Ok(ActionOutcome::Rejected(rejection));
        }
        let payment = match self.charge(participant, &action.cost, &reason).await? {
            Ok(payment) => payment,
            Err(rejection) => return Ok(ActionOutcome::Rejected(rejection)),
        };

        if let Err(e) = self.store.set_action_usage(&usage_key, used + 1).await {
            self.refund(participant, &payment, &reason).await;
            return Err(e);
        }

        let rolled = self.with_rng(|rng| {
            GenericActionHandler::roll_rewards(&definition.id, action_index, action, participant, rng)
        });
        let mut journal = GrantJournal::new();
        let mut outcome = Ok(Vec::new());
        for grant in &rolled.grants {
            if let Err(e) = self.distributor.apply_tracked(grant, &mut journal).await {
                outcome = Err(e);
                break;
            }
        }
        if outcome.is_ok() {
            outcome = self
                .apply_locked(&mut state, &definition, Some(participant), 1)
                .await
                .map(|(_, hits)| hits);
        }
        let hits = match outcome {
            Ok(hits) => hits,
            Err(e) => {
                error!(
                    %community,
                    %participant,
                    action_index,
                    error = %e,
                    "action failed after payment; compensating"
                );
                self.distributor.revoke(journal).await;
                if let Err(restore) = self.store.set_action_usage(&usage_key, used).await {
                    error!(%participant, error = %restore, "failed to restore action usage");
                }
                self.refund(participant, &payment, &reason).await;
                return Err(e);
            }
        };
        drop(guard);

        self.pay_milestones(community, &definition, &hits).await;
        info!(
            %community,
            %participant,
            event_id = %definition.id,
            action_index,
            rewards = rolled.grants.len(),
            "action executed"
        );
        let message = if rolled.grants.is_empty() {
            rolled.miss_message
        } else {
            if let Some(template) = &action.public_message {
                let text = public_text(template, participant, &rolled.grants);
                self.notifier().announce(community, &text).await;
            }
            action.message.clone()
        };
        Ok(ActionOutcome::Executed {
            action_index,
            grants: rolled.grants,
            used_today: used + 1,
            daily_limit: action.daily_limit,
            message,
        })
    }

    async fn check_cost(
        &self,
        participant: ParticipantId,
        cost: &ActionCost,
    ) -> Result<Option<Rejection>, EngineError> {
        if cost.currency > 0 {
            let available = self.distributor.ledger().balance(participant).await?;
            if available < cost.currency {
                return Ok(Some(Rejection::InsufficientFunds {
                    required: cost.currency,
                    available,
                }));
            }
        }
        if let Some(item) = &cost.item {
            let available = self
                .distributor
                .inventory()
                .quantity(participant, &item.key)
                .await?;
            if available < item.qty {
                return Ok(Some(Rejection::InsufficientItems {
                    item_key: item.key.clone(),
                    required: item.qty,
                    available,
                }));
            }
        }
        if let Some(kind) = &cost.item_type {
            let mut available = 0_u64;
            for key in &kind.members {
                let held = self.distributor.inventory().quantity(participant, key).await?;
                available = available.saturating_add(held);
            }
            if available < kind.qty {
                return Ok(Some(Rejection::InsufficientItems {
                    item_key: kind.name.clone(),
                    required: kind.qty,
                    available,
                }));
            }
        }
        Ok(None)
    }

    /// Debits the currency cost, then consumes the item and item-type costs.
    /// A balance that changed since the check is reported as a rejection.
    async fn charge(
        &self,
        participant: ParticipantId,
        cost: &ActionCost,
        reason: &str,
    ) -> Result<Result<Payment, Rejection>, EngineError> {
        let mut payment = Payment::default();
        if cost.currency > 0 {
            if !self
                .distributor
                .ledger()
                .debit(participant, cost.currency, reason)
                .await?
            {
                let available = self.distributor.ledger().balance(participant).await?;
                return Ok(Err(Rejection::InsufficientFunds {
                    required: cost.currency,
                    available,
                }));
            }
            payment.currency = cost.currency;
        }
        if let Some(item) = &cost.item
            && let Err(stop) = self.take_item(participant, item, &mut payment, reason).await
        {
            return stop.map(Err);
        }
        if let Some(kind) = &cost.item_type {
            let mut remaining = kind.qty;
            for key in &kind.members {
                if remaining == 0 {
                    break;
                }
                let held = match self.distributor.inventory().quantity(participant, key).await {
                    Ok(held) => held,
                    Err(e) => {
                        self.refund(participant, &payment, reason).await;
                        return Err(e);
                    }
                };
                let take = remaining.min(held);
                if take == 0 {
                    continue;
                }
                let part = ItemAmount {
                    key: key.clone(),
                    qty: take,
                };
                if let Err(stop) = self.take_item(participant, &part, &mut payment, reason).await {
                    return stop.map(Err);
                }
                remaining -= take;
            }
            if remaining > 0 {
                self.refund(participant, &payment, reason).await;
                return Ok(Err(Rejection::InsufficientItems {
                    item_key: kind.name.clone(),
                    required: kind.qty,
                    available: kind.qty - remaining,
                }));
            }
        }
        Ok(Ok(payment))
    }

    /// Consumes one item amount into `payment`. On failure everything paid
    /// so far is refunded and the rejection or error is handed back.
    async fn take_item(
        &self,
        participant: ParticipantId,
        item: &ItemAmount,
        payment: &mut Payment,
        reason: &str,
    ) -> Result<(), Result<Rejection, EngineError>> {
        match self
            .distributor
            .inventory()
            .consume(participant, &item.key, item.qty)
            .await
        {
            Ok(true) => {
                payment.items.push(item.clone());
                Ok(())
            }
            Ok(false) => {
                self.refund(participant, payment, reason).await;
                let available = self
                    .distributor
                    .inventory()
                    .quantity(participant, &item.key)
                    .await
                    .unwrap_or(0);
                Err(Ok(Rejection::InsufficientItems {
                    item_key: item.key.clone(),
                    required: item.qty,
                    available,
                }))
            }
            Err(e) => {
                self.refund(participant, payment, reason).await;
                Err(Err(e))
            }
        }
    }

    async fn refund(&self, participant: ParticipantId, payment: &Payment, reason: &str) {
        let reason = format!("refund:{reason}");
        if payment.currency > 0
            && let Err(e) = self
                .distributor
                .ledger()
                .credit(participant, payment.currency, &reason)
                .await
        {
            error!(%participant, amount = payment.currency, error = %e, "currency refund failed");
        }
        for item in &payment.items {
            if let Err(e) = self
                .distributor
                .inventory()
                .grant(participant, &item.key, item.qty)
                .await
            {
                error!(%participant, item = %item.key, error = %e, "item refund failed");
            }
        }
    }
}

/// Fills `{participant}` and `{rewards}` in an action's public message.
fn public_text(template: &str, participant: ParticipantId, grants: &[Grant]) -> String {
    let rewards = grants
        .iter()
        .flat_map(|grant| {
            let currency = (grant.currency > 0).then(|| format!("{} currency", grant.currency));
            currency
                .into_iter()
                .chain(grant.items.iter().map(|item| format!("{} {}", item.qty, item.key)))
        })
        .collect::<Vec<_>>()
        .join(", ");
    template
        .replace("{participant}", &participant.to_string())
        .replace("{rewards}", &rewards)
}
