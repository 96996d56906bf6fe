//! Generic action execution: costs, daily limits, rewards and compensation.

mod common;

use chrono::Duration;
use rally_core::error::Rejection;
use rally_core::ids::ParticipantId;
use rally_events::domain::handlers::{GenericActionState, SubState};
use rally_events::domain::outcomes::ActionOutcome;

use common::{COMMUNITY, Harness, WISHING_WELL, harness};

const ALICE: ParticipantId = ParticipantId(7);

async fn running_well() -> Harness {
    let h = harness(WISHING_WELL);
    h.engine.start(COMMUNITY, "wishing_well").await.unwrap();
    h
}

#[tokio::test]
async fn test_execute_charges_cost_and_grants_rolled_reward() {
    // Arrange
    let h = running_well().await;
    h.ledger.set_balance(ALICE, 1000);

    // Act
    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 0)
        .await
        .unwrap();

    // Assert
    let ActionOutcome::Executed {
        grants,
        used_today,
        daily_limit,
        ..
    } = outcome
    else {
        panic!("expected execution, got {outcome:?}");
    };
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].reason.to_string(), "action:wishing_well:0");
    assert_eq!((used_today, daily_limit), (1, 2));
    assert_eq!(h.ledger.balance_of(ALICE), 1000 - 100 + 250);
    let status = h.engine.status(COMMUNITY).await.unwrap().unwrap();
    assert_eq!(
        status.sub_state,
        SubState::GenericAction(GenericActionState { executions: 1 })
    );
    assert!(status.progress.is_none());
}

#[tokio::test]
async fn test_daily_limit_resets_on_the_next_local_day() {
    // Arrange
    let h = running_well().await;
    h.ledger.set_balance(ALICE, 10_000);
    for _ in 0..2 {
        h.engine
            .execute_action(COMMUNITY, "wishing_well", ALICE, 0)
            .await
            .unwrap();
    }

    // Act
    let blocked = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 0)
        .await
        .unwrap();
    h.clock.advance(Duration::days(1));
    let next_day = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 0)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        blocked,
        ActionOutcome::Rejected(Rejection::LimitReached { limit: 2 })
    );
    assert_eq!(h.ledger.debits().len(), 3);
    assert!(matches!(
        next_day,
        ActionOutcome::Executed { used_today: 1, .. }
    ));
}

#[tokio::test]
async fn test_insufficient_funds_is_rejected_without_effect() {
    let h = running_well().await;
    h.ledger.set_balance(ALICE, 50);

    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 0)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActionOutcome::Rejected(Rejection::InsufficientFunds {
            required: 100,
            available: 50
        })
    );
    assert!(h.ledger.debits().is_empty());
    assert!(!h.repo.keys().iter().any(|k| k.starts_with("rally:usage")));
}

#[tokio::test]
async fn test_insufficient_items_is_rejected() {
    let h = running_well().await;

    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 1)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActionOutcome::Rejected(Rejection::InsufficientItems {
            item_key: "pearl".to_owned(),
            required: 1,
            available: 0
        })
    );
}

#[tokio::test]
async fn test_item_cost_is_consumed_and_item_reward_granted() {
    let h = running_well().await;
    h.inventory.set_quantity(ALICE, "pearl", 2);

    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 1)
        .await
        .unwrap();

    assert!(matches!(outcome, ActionOutcome::Executed { daily_limit: 0, .. }));
    assert_eq!(h.inventory.quantity_of(ALICE, "pearl"), 1);
    assert_eq!(h.inventory.quantity_of(ALICE, "wish"), 1);
}

#[tokio::test]
async fn test_item_type_cost_draws_from_members_in_order() {
    // Arrange
    let h = running_well().await;
    h.inventory.set_quantity(ALICE, "carp", 2);
    h.inventory.set_quantity(ALICE, "trout", 5);

    // Act
    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 2)
        .await
        .unwrap();

    // Assert
    let ActionOutcome::Executed { message, .. } = outcome else {
        panic!("expected execution, got {outcome:?}");
    };
    assert_eq!(message.as_deref(), Some("The koi are pleased."));
    assert_eq!(h.inventory.quantity_of(ALICE, "carp"), 0);
    assert_eq!(h.inventory.quantity_of(ALICE, "trout"), 4);
    assert_eq!(h.ledger.balance_of(ALICE), 40);
    let (community, last) = h.notifier.messages().last().cloned().unwrap();
    assert_eq!(community, COMMUNITY);
    assert_eq!(last, "7 fed the koi and got 40 currency");
}

#[tokio::test]
async fn test_item_type_cost_counts_every_member() {
    let h = running_well().await;
    h.inventory.set_quantity(ALICE, "carp", 1);
    h.inventory.set_quantity(ALICE, "trout", 1);

    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 2)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActionOutcome::Rejected(Rejection::InsufficientItems {
            item_key: "fish".to_owned(),
            required: 3,
            available: 2
        })
    );
    assert_eq!(h.inventory.quantity_of(ALICE, "carp"), 1);
    assert_eq!(h.inventory.quantity_of(ALICE, "trout"), 1);
}

#[tokio::test]
async fn test_missed_roll_reports_its_fail_message_quietly() {
    // Arrange
    let h = running_well().await;
    let announced = h.notifier.messages().len();

    // Act
    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 3)
        .await
        .unwrap();

    // Assert
    let ActionOutcome::Executed {
        grants, message, ..
    } = outcome
    else {
        panic!("expected execution, got {outcome:?}");
    };
    assert!(grants.is_empty());
    assert_eq!(message.as_deref(), Some("Only darkness looks back."));
    assert_eq!(h.notifier.messages().len(), announced);
}

#[tokio::test]
async fn test_failed_reward_grant_refunds_cost_and_usage() {
    // Arrange
    let h = running_well().await;
    h.inventory.set_quantity(ALICE, "pearl", 1);
    h.inventory.fail_grants_of(Some("wish"));

    // Act
    let result = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 1)
        .await;

    // Assert
    assert!(result.is_err());
    assert_eq!(h.inventory.quantity_of(ALICE, "pearl"), 1);
    assert_eq!(h.inventory.quantity_of(ALICE, "wish"), 0);
    let usage = h
        .repo
        .value("rally:usage:1:wishing_well:1:2026-01-15:7")
        .unwrap();
    assert_eq!(usage, serde_json::json!(0));
}

#[tokio::test]
async fn test_failed_progress_persist_reverses_everything() {
    // Arrange
    let h = running_well().await;
    h.ledger.set_balance(ALICE, 1000);
    h.repo.fail_writes_with_prefix(Some("rally:active"));

    // Act
    let result = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 0)
        .await;

    // Assert
    assert!(result.is_err());
    assert_eq!(h.ledger.balance_of(ALICE), 1000);
    h.repo.fail_writes_with_prefix(None);
    let status = h.engine.status(COMMUNITY).await.unwrap().unwrap();
    assert_eq!(
        status.sub_state,
        SubState::GenericAction(GenericActionState { executions: 0 })
    );
}

#[tokio::test]
async fn test_failed_usage_write_refunds_cost() {
    let h = running_well().await;
    h.ledger.set_balance(ALICE, 1000);
    h.repo.fail_writes_with_prefix(Some("rally:usage"));

    let result = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 0)
        .await;

    assert!(result.is_err());
    assert_eq!(h.ledger.balance_of(ALICE), 1000);
    assert!(
        h.ledger
            .credits()
            .iter()
            .all(|(_, _, reason)| reason == "refund:action:wishing_well:0")
    );
}

#[tokio::test]
async fn test_actions_are_rejected_for_other_event_types() {
    // Arrange
    let h = harness(WISHING_WELL);
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();

    // Act
    let outcome = h
        .engine
        .execute_action(COMMUNITY, "cthulhu_raid", ALICE, 0)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        outcome,
        ActionOutcome::Rejected(Rejection::UnsupportedOperation {
            event_id: "cthulhu_raid".to_owned(),
            operation: "execute_action"
        })
    );
}

#[tokio::test]
async fn test_unknown_action_index_is_rejected() {
    let h = running_well().await;

    let outcome = h
        .engine
        .execute_action(COMMUNITY, "wishing_well", ALICE, 5)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ActionOutcome::Rejected(Rejection::UnknownAction { index: 5 })
    );
}
