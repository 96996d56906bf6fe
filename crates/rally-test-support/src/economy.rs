//! In-memory ledger and inventory.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rally_core::economy::{Inventory, Ledger};
use rally_core::error::EngineError;
use rally_core::ids::ParticipantId;

/// A ledger held in memory that records every credit and debit.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: Mutex<HashMap<ParticipantId, u64>>,
    credits: Mutex<Vec<(ParticipantId, u64, String)>>,
    debits: Mutex<Vec<(ParticipantId, u64, String)>>,
    failing_participant: Mutex<Option<ParticipantId>>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a balance directly.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_balance(&self, participant: ParticipantId, amount: u64) {
        self.balances.lock().unwrap().insert(participant, amount);
    }

    /// Read a balance directly.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn balance_of(&self, participant: ParticipantId) -> u64 {
        self.balances
            .lock()
            .unwrap()
            .get(&participant)
            .copied()
            .unwrap_or(0)
    }

    /// Every successful credit as `(participant, amount, reason)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn credits(&self) -> Vec<(ParticipantId, u64, String)> {
        self.credits.lock().unwrap().clone()
    }

    /// Every successful debit as `(participant, amount, reason)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn debits(&self) -> Vec<(ParticipantId, u64, String)> {
        self.debits.lock().unwrap().clone()
    }

    /// Make credits to `participant` fail. `None` clears it.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_credits_for(&self, participant: Option<ParticipantId>) {
        *self.failing_participant.lock().unwrap() = participant;
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn credit(
        &self,
        participant: ParticipantId,
        amount: u64,
        reason: &str,
    ) -> Result<(), EngineError> {
        if *self.failing_participant.lock().unwrap() == Some(participant) {
            return Err(EngineError::Infrastructure("ledger unavailable".into()));
        }
        *self.balances.lock().unwrap().entry(participant).or_insert(0) += amount;
        self.credits
            .lock()
            .unwrap()
            .push((participant, amount, reason.to_owned()));
        Ok(())
    }

    async fn debit(
        &self,
        participant: ParticipantId,
        amount: u64,
        reason: &str,
    ) -> Result<bool, EngineError> {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(participant).or_insert(0);
        if *balance < amount {
            return Ok(false);
        }
        *balance -= amount;
        self.debits
            .lock()
            .unwrap()
            .push((participant, amount, reason.to_owned()));
        Ok(true)
    }

    async fn balance(&self, participant: ParticipantId) -> Result<u64, EngineError> {
        Ok(self.balance_of(participant))
    }
}

/// An inventory held in memory that records every grant.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    items: Mutex<HashMap<(ParticipantId, String), u64>>,
    grants: Mutex<Vec<(ParticipantId, String, u64)>>,
    failing_item: Mutex<Option<String>>,
    fail_consumes: Mutex<bool>,
}

impl InMemoryInventory {
    /// Create an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a quantity directly.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_quantity(&self, participant: ParticipantId, item_key: &str, qty: u64) {
        self.items
            .lock()
            .unwrap()
            .insert((participant, item_key.to_owned()), qty);
    }

    /// Read a quantity directly.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn quantity_of(&self, participant: ParticipantId, item_key: &str) -> u64 {
        self.items
            .lock()
            .unwrap()
            .get(&(participant, item_key.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Every successful grant as `(participant, item_key, qty)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn grants(&self) -> Vec<(ParticipantId, String, u64)> {
        self.grants.lock().unwrap().clone()
    }

    /// Make grants of `item_key` fail. `None` clears it.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_grants_of(&self, item_key: Option<&str>) {
        *self.failing_item.lock().unwrap() = item_key.map(str::to_owned);
    }

    /// Make every consume fail with an infrastructure error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_consumes(&self, fail: bool) {
        *self.fail_consumes.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Inventory for InMemoryInventory {
    async fn grant(
        &self,
        participant: ParticipantId,
        item_key: &str,
        qty: u64,
    ) -> Result<(), EngineError> {
        if self.failing_item.lock().unwrap().as_deref() == Some(item_key) {
            return Err(EngineError::Infrastructure("inventory unavailable".into()));
        }
        *self
            .items
            .lock()
            .unwrap()
            .entry((participant, item_key.to_owned()))
            .or_insert(0) += qty;
        self.grants
            .lock()
            .unwrap()
            .push((participant, item_key.to_owned(), qty));
        Ok(())
    }

    async fn consume(
        &self,
        participant: ParticipantId,
        item_key: &str,
        qty: u64,
    ) -> Result<bool, EngineError> {
        if *self.fail_consumes.lock().unwrap() {
            return Err(EngineError::Infrastructure("inventory unavailable".into()));
        }
        let mut items = self.items.lock().unwrap();
        let held = items.entry((participant, item_key.to_owned())).or_insert(0);
        if *held < qty {
            return Ok(false);
        }
        *held -= qty;
        Ok(true)
    }

    async fn quantity(
        &self,
        participant: ParticipantId,
        item_key: &str,
    ) -> Result<u64, EngineError> {
        Ok(self.quantity_of(participant, item_key))
    }
}
