//! `PostgreSQL` implementations of the `Ledger` and `Inventory` collaborators.
//!
//! Each call is a single transaction. Debits and consumes are conditional
//! updates, so a balance can never go negative under concurrent callers.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use rally_core::economy::{Inventory, Ledger};
use rally_core::error::EngineError;
use rally_core::ids::ParticipantId;

use crate::{from_db, map_sqlx, to_db};

/// PostgreSQL-backed currency ledger.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Creates a new `PgLedger`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn credit(
        &self,
        participant: ParticipantId,
        amount: u64,
        reason: &str,
    ) -> Result<(), EngineError> {
        let id = to_db(participant.0)?;
        let amount = to_db(amount)?;
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query(
            r"
            INSERT INTO ledger_balances (participant_id, balance) VALUES ($1, $2)
            ON CONFLICT (participant_id)
            DO UPDATE SET balance = ledger_balances.balance + EXCLUDED.balance
            ",
        )
        .bind(id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        sqlx::query(
            "INSERT INTO ledger_transactions (participant_id, amount, reason) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(amount)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        debug!(%participant, amount, reason, "ledger credit");
        Ok(())
    }

    async fn debit(
        &self,
        participant: ParticipantId,
        amount: u64,
        reason: &str,
    ) -> Result<bool, EngineError> {
        let id = to_db(participant.0)?;
        let amount = to_db(amount)?;
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let updated = sqlx::query(
            r"
            UPDATE ledger_balances SET balance = balance - $2
            WHERE participant_id = $1 AND balance >= $2
            ",
        )
        .bind(id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(false);
        }
        sqlx::query(
            "INSERT INTO ledger_transactions (participant_id, amount, reason) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(-amount)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        debug!(%participant, amount, reason, "ledger debit");
        Ok(true)
    }

    async fn balance(&self, participant: ParticipantId) -> Result<u64, EngineError> {
        let row = sqlx::query("SELECT balance FROM ledger_balances WHERE participant_id = $1")
            .bind(to_db(participant.0)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        match row {
            Some(row) => Ok(from_db(row.try_get("balance").map_err(map_sqlx)?)),
            None => Ok(0),
        }
    }
}

/// PostgreSQL-backed item inventory.
#[derive(Debug, Clone)]
pub struct PgInventory {
    pool: PgPool,
}

impl PgInventory {
    /// Creates a new `PgInventory`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Inventory for PgInventory {
    async fn grant(
        &self,
        participant: ParticipantId,
        item_key: &str,
        qty: u64,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r"
            INSERT INTO inventory_items (participant_id, item_key, quantity) VALUES ($1, $2, $3)
            ON CONFLICT (participant_id, item_key)
            DO UPDATE SET quantity = inventory_items.quantity + EXCLUDED.quantity
            ",
        )
        .bind(to_db(participant.0)?)
        .bind(item_key)
        .bind(to_db(qty)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn consume(
        &self,
        participant: ParticipantId,
        item_key: &str,
        qty: u64,
    ) -> Result<bool, EngineError> {
        let updated = sqlx::query(
            r"
            UPDATE inventory_items SET quantity = quantity - $3
            WHERE participant_id = $1 AND item_key = $2 AND quantity >= $3
            ",
        )
        .bind(to_db(participant.0)?)
        .bind(item_key)
        .bind(to_db(qty)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(updated.rows_affected() == 1)
    }

    async fn quantity(
        &self,
        participant: ParticipantId,
        item_key: &str,
    ) -> Result<u64, EngineError> {
        let row = sqlx::query(
            "SELECT quantity FROM inventory_items WHERE participant_id = $1 AND item_key = $2",
        )
        .bind(to_db(participant.0)?)
        .bind(item_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        match row {
            Some(row) => Ok(from_db(row.try_get("quantity").map_err(map_sqlx)?)),
            None => Ok(0),
        }
    }
}
