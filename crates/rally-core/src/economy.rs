//! Ledger and inventory collaborators.
//!
//! The engine never owns balances; it asks these collaborators to move
//! currency and items. Each call is expected to be atomic on its own.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::ids::ParticipantId;

/// Currency ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Adds `amount` to the participant's balance, recording `reason`.
    async fn credit(
        &self,
        participant: ParticipantId,
        amount: u64,
        reason: &str,
    ) -> Result<(), EngineError>;

    /// Removes `amount` if the balance covers it. Returns `false` (and changes
    /// nothing) when funds are insufficient.
    async fn debit(
        &self,
        participant: ParticipantId,
        amount: u64,
        reason: &str,
    ) -> Result<bool, EngineError>;

    /// Current balance.
    async fn balance(&self, participant: ParticipantId) -> Result<u64, EngineError>;
}

/// Item inventory.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Adds `qty` of `item_key`.
    async fn grant(
        &self,
        participant: ParticipantId,
        item_key: &str,
        qty: u64,
    ) -> Result<(), EngineError>;

    /// Removes `qty` of `item_key` if available. Returns `false` (and changes
    /// nothing) when the participant holds fewer.
    async fn consume(
        &self,
        participant: ParticipantId,
        item_key: &str,
        qty: u64,
    ) -> Result<bool, EngineError>;

    /// Quantity of `item_key` currently held.
    async fn quantity(&self, participant: ParticipantId, item_key: &str)
    -> Result<u64, EngineError>;
}
