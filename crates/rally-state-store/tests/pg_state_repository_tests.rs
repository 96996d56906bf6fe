//! Integration tests for the PostgreSQL collaborators.

use rally_core::economy::{Inventory, Ledger};
use rally_core::ids::ParticipantId;
use rally_core::repository::StateRepository;
use rally_state_store::pg_economy::{PgInventory, PgLedger};
use rally_state_store::pg_state_repository::PgStateRepository;
use sqlx::PgPool;

// --- get_state / set_state ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_state_returns_none_for_missing_key(pool: PgPool) {
    let repo = PgStateRepository::new(pool);

    let value = repo.get_state("rally:active:1").await.unwrap();

    assert!(value.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_set_then_get_round_trips_json(pool: PgPool) {
    let repo = PgStateRepository::new(pool);
    let value = serde_json::json!({"definition_id": "cthulhu_raid", "reached": [50]});

    repo.set_state("rally:active:1", value.clone()).await.unwrap();

    assert_eq!(repo.get_state("rally:active:1").await.unwrap(), Some(value));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_set_state_overwrites_previous_value(pool: PgPool) {
    let repo = PgStateRepository::new(pool);

    repo.set_state("k", serde_json::json!(1)).await.unwrap();
    repo.set_state("k", serde_json::json!(2)).await.unwrap();

    assert_eq!(repo.get_state("k").await.unwrap(), Some(serde_json::json!(2)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_state_removes_key_and_tolerates_missing(pool: PgPool) {
    let repo = PgStateRepository::new(pool);
    repo.set_state("k", serde_json::json!(true)).await.unwrap();

    repo.delete_state("k").await.unwrap();
    repo.delete_state("k").await.unwrap();

    assert!(repo.get_state("k").await.unwrap().is_none());
}

// --- ledger ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_debit_refuses_to_overdraw(pool: PgPool) {
    let ledger = PgLedger::new(pool);
    let alice = ParticipantId(42);
    ledger.credit(alice, 100, "test").await.unwrap();

    assert!(!ledger.debit(alice, 150, "test").await.unwrap());
    assert!(ledger.debit(alice, 60, "test").await.unwrap());
    assert_eq!(ledger.balance(alice).await.unwrap(), 40);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_balance_of_unknown_participant_is_zero(pool: PgPool) {
    let ledger = PgLedger::new(pool);

    assert_eq!(ledger.balance(ParticipantId(7)).await.unwrap(), 0);
    assert!(!ledger.debit(ParticipantId(7), 1, "test").await.unwrap());
}

// --- inventory ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_inventory_grant_and_consume(pool: PgPool) {
    let inventory = PgInventory::new(pool);
    let bob = ParticipantId(9);

    inventory.grant(bob, "pearl", 3).await.unwrap();
    inventory.grant(bob, "pearl", 2).await.unwrap();

    assert!(!inventory.consume(bob, "pearl", 6).await.unwrap());
    assert!(inventory.consume(bob, "pearl", 5).await.unwrap());
    assert_eq!(inventory.quantity(bob, "pearl").await.unwrap(), 0);
    assert_eq!(inventory.quantity(bob, "chest").await.unwrap(), 0);
}
