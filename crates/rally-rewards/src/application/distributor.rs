//! Reward distribution.
//!
//! A single grant lands whole or not at all: steps that were applied before a
//! failing step are revoked. Across a plan, grants are independent: one
//! participant's failure is logged and reported and never stops the others.

use std::sync::Arc;

use futures::future::join_all;
use rally_core::economy::{Inventory, Ledger};
use rally_core::error::EngineError;
use rally_core::ids::ParticipantId;
use tracing::{error, info, warn};

use crate::domain::plan::{Grant, RewardPlan};

/// Outcome of distributing one plan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DistributionReport {
    /// Grants applied in full.
    pub delivered: usize,
    /// Grants that failed, with the error text. Nothing of them stayed applied.
    pub failed: Vec<(ParticipantId, String)>,
}

impl DistributionReport {
    /// Whether every grant landed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
enum Step {
    Currency {
        participant: ParticipantId,
        amount: u64,
        reason: String,
    },
    Item {
        participant: ParticipantId,
        key: String,
        qty: u64,
    },
}

/// Grant steps that landed, in order, so a caller can take them back.
#[derive(Debug, Default)]
pub struct GrantJournal {
    steps: Vec<Step>,
}

impl GrantJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has landed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Applies reward plans through the ledger and inventory collaborators.
#[derive(Clone)]
pub struct RewardDistributor {
    ledger: Arc<dyn Ledger>,
    inventory: Arc<dyn Inventory>,
}

impl RewardDistributor {
    /// Creates a distributor over the given collaborators.
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, inventory: Arc<dyn Inventory>) -> Self {
        Self { ledger, inventory }
    }

    /// The ledger grants are credited to.
    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// The inventory items are granted into.
    #[must_use]
    pub fn inventory(&self) -> &Arc<dyn Inventory> {
        &self.inventory
    }

    /// Applies one grant: currency first, then each item.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator error, after revoking whatever part of
    /// the grant had already landed.
    pub async fn apply_grant(&self, grant: &Grant) -> Result<(), EngineError> {
        let mut journal = GrantJournal::new();
        if let Err(e) = self.apply_tracked(grant, &mut journal).await {
            self.revoke(journal).await;
            return Err(e);
        }
        Ok(())
    }

    /// Applies one grant, recording each step that landed in `journal`.
    /// On error the journal holds the partial grant; nothing is undone.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator error.
    pub async fn apply_tracked(
        &self,
        grant: &Grant,
        journal: &mut GrantJournal,
    ) -> Result<(), EngineError> {
        let reason = grant.reason.to_string();
        if grant.currency > 0 {
            self.ledger
                .credit(grant.participant, grant.currency, &reason)
                .await?;
            journal.steps.push(Step::Currency {
                participant: grant.participant,
                amount: grant.currency,
                reason: reason.clone(),
            });
        }
        for item in &grant.items {
            self.inventory
                .grant(grant.participant, &item.key, item.qty)
                .await?;
            journal.steps.push(Step::Item {
                participant: grant.participant,
                key: item.key.clone(),
                qty: item.qty,
            });
        }
        info!(
            participant = %grant.participant,
            currency = grant.currency,
            items = grant.items.len(),
            reason = %reason,
            "reward granted"
        );
        Ok(())
    }

    /// Takes back every journaled step, newest first. Failures are logged;
    /// a reward the participant already spent cannot be recovered.
    pub async fn revoke(&self, journal: GrantJournal) {
        for step in journal.steps.into_iter().rev() {
            match step {
                Step::Currency {
                    participant,
                    amount,
                    reason,
                } => {
                    let reason = format!("revoke:{reason}");
                    match self.ledger.debit(participant, amount, &reason).await {
                        Ok(true) => {}
                        Ok(false) => error!(%participant, amount, "cannot revoke spent reward"),
                        Err(e) => error!(%participant, amount, error = %e, "reward revoke failed"),
                    }
                }
                Step::Item {
                    participant,
                    key,
                    qty,
                } => match self.inventory.consume(participant, &key, qty).await {
                    Ok(true) => {}
                    Ok(false) => error!(%participant, item = %key, "cannot revoke spent item"),
                    Err(e) => error!(%participant, item = %key, error = %e, "item revoke failed"),
                },
            }
        }
    }

    /// Applies every grant of `plan` concurrently and reports what landed.
    pub async fn distribute(&self, plan: &RewardPlan) -> DistributionReport {
        let outcomes = join_all(plan.grants.iter().map(|grant| async move {
            (grant.participant, self.apply_grant(grant).await)
        }))
        .await;

        let mut report = DistributionReport::default();
        for (participant, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        %participant,
                        reason = %plan.reason,
                        error = %e,
                        "reward grant failed"
                    );
                    report.failed.push((participant, e.to_string()));
                }
            }
        }
        report
    }
}
