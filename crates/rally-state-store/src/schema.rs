//! Database schema.
//!
//! The same statements ship as migrations under `migrations/`; these
//! constants let tools bootstrap a database without the migrator.

/// Key/value table backing `StateRepository`.
pub const CREATE_ENGINE_STATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS engine_state (
    state_key   TEXT PRIMARY KEY,
    value       JSONB NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

/// Ledger tables backing `PgLedger`.
pub const CREATE_LEDGER_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS ledger_balances (
    participant_id  BIGINT PRIMARY KEY,
    balance         BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0)
);

CREATE TABLE IF NOT EXISTS ledger_transactions (
    id              BIGSERIAL PRIMARY KEY,
    participant_id  BIGINT NOT NULL,
    amount          BIGINT NOT NULL,
    reason          TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_ledger_transactions_participant
    ON ledger_transactions (participant_id, created_at);
";

/// Inventory table backing `PgInventory`.
pub const CREATE_INVENTORY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS inventory_items (
    participant_id  BIGINT NOT NULL,
    item_key        TEXT NOT NULL,
    quantity        BIGINT NOT NULL CHECK (quantity >= 0),
    PRIMARY KEY (participant_id, item_key)
);
";
