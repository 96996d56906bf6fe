//! Results of quest operations.

use rally_core::error::Rejection;
use rally_rewards::domain::plan::Grant;
use serde::Serialize;

/// Result of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// The quest is now claimed and its reward was dispatched.
    Claimed {
        /// The rolled reward.
        grant: Grant,
        /// Whether the ledger and inventory accepted it.
        delivered: bool,
    },
    /// Nothing changed.
    Rejected(Rejection),
}
