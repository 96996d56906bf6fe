//! Contribution aggregation and milestone payout.

mod common;

use chrono::Duration;
use rally_core::error::Rejection;
use rally_core::ids::ParticipantId;
use rally_events::domain::handlers::{CollectionState, RaidState, SubState};
use rally_events::domain::outcomes::{ContributionOutcome, TickOutcome};
use tokio::task::JoinSet;

use common::{COLLECTION, COMMUNITY, RAID, harness};

fn applied(outcome: &ContributionOutcome) -> (u64, Vec<u32>) {
    match outcome {
        ContributionOutcome::Applied {
            applied,
            milestones,
            ..
        } => (*applied, milestones.clone()),
        ContributionOutcome::Rejected(r) => panic!("unexpected rejection: {r}"),
    }
}

fn milestone_credits(h: &common::Harness, percent: u32) -> Vec<u64> {
    let reason = format!("milestone:cthulhu_raid:{percent}");
    let mut who: Vec<u64> = h
        .ledger
        .credits()
        .into_iter()
        .filter(|(_, _, r)| *r == reason)
        .map(|(p, _, _)| p.0)
        .collect();
    who.sort_unstable();
    who
}

async fn raid_hp(h: &common::Harness) -> u64 {
    match h.engine.status(COMMUNITY).await.unwrap().unwrap().sub_state {
        SubState::Raid(RaidState { hp_current, .. }) => hp_current,
        other => panic!("not a raid: {other:?}"),
    }
}

#[tokio::test]
async fn test_raid_contributions_clamp_and_fire_milestones_once() {
    // Arrange
    let h = harness(RAID);
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();

    // Act
    let a = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(1), 400)
        .await
        .unwrap();
    let hp_a = raid_hp(&h).await;
    let b = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(2), 400)
        .await
        .unwrap();
    let hp_b = raid_hp(&h).await;
    let c = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(3), 300)
        .await
        .unwrap();
    let hp_c = raid_hp(&h).await;

    // Assert
    assert_eq!((hp_a, hp_b, hp_c), (600, 200, 0));
    assert_eq!(applied(&a), (400, vec![]));
    assert_eq!(applied(&b), (400, vec![50, 75]));
    assert_eq!(applied(&c), (200, vec![100]));
    assert_eq!(milestone_credits(&h, 50), vec![1, 2]);
    assert_eq!(milestone_credits(&h, 75), vec![1, 2]);
    assert_eq!(milestone_credits(&h, 100), vec![1, 2, 3]);
    assert!(
        h.notifier
            .messages()
            .iter()
            .any(|(_, text)| text == "Halfway there")
    );
}

#[tokio::test]
async fn test_one_jump_across_thresholds_fires_each_once() {
    // Arrange
    let h = harness(RAID);
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();
    h.engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(1), 400)
        .await
        .unwrap();

    // Act
    let jump = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(1), 650)
        .await
        .unwrap();
    let after = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(2), 50)
        .await
        .unwrap();

    // Assert
    assert_eq!(applied(&jump), (600, vec![50, 75, 100]));
    assert_eq!(applied(&after), (0, vec![]));
    for percent in [50, 75, 100] {
        assert_eq!(milestone_credits(&h, percent), vec![1]);
    }
}

#[tokio::test]
async fn test_collection_counts_down_and_completes() {
    // Arrange
    let h = harness(COLLECTION);
    h.engine.startup().await;
    h.engine.start(COMMUNITY, "lantern_drive").await.unwrap();

    // Act
    let a = h
        .engine
        .contribute(COMMUNITY, "lantern_drive", ParticipantId(1), 4)
        .await
        .unwrap();
    let remaining_after_a = match h.engine.status(COMMUNITY).await.unwrap().unwrap().sub_state {
        SubState::CollectionQuest(CollectionState { remaining, .. }) => remaining,
        other => panic!("not a collection: {other:?}"),
    };
    let b = h
        .engine
        .contribute(COMMUNITY, "lantern_drive", ParticipantId(2), 8)
        .await
        .unwrap();
    let tick = h.engine.tick(COMMUNITY).await.unwrap();

    // Assert
    assert_eq!(applied(&a).0, 4);
    assert_eq!(remaining_after_a, 6);
    assert_eq!(applied(&b).0, 6);
    assert_eq!(
        tick,
        TickOutcome::Ended {
            event_id: "lantern_drive".to_owned(),
            completed: true
        }
    );
    // Participant 2 applied 6 of 10 and takes first place.
    assert_eq!(h.ledger.balance_of(ParticipantId(2)), 10 + 30);
    assert_eq!(h.ledger.balance_of(ParticipantId(1)), 10);
}

#[tokio::test]
async fn test_concurrent_contributions_are_all_counted() {
    // Arrange
    let h = harness(RAID);
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();
    let mut tasks = JoinSet::new();

    // Act
    for who in 0..40_u64 {
        let engine = h.engine.clone();
        tasks.spawn(async move {
            engine
                .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(who), 10)
                .await
                .unwrap()
        });
    }
    let mut total = 0;
    while let Some(outcome) = tasks.join_next().await {
        total += applied(&outcome.unwrap()).0;
    }

    // Assert
    let status = h.engine.status(COMMUNITY).await.unwrap().unwrap();
    assert_eq!(total, 400);
    assert_eq!(status.participants, 40);
    assert_eq!(
        status.sub_state,
        SubState::Raid(RaidState {
            hp_current: 600,
            hp_max: 1000
        })
    );
}

#[tokio::test]
async fn test_concurrent_contributions_fire_each_milestone_once() {
    // Arrange: 50 callers of 25 each overshoot the 1000 HP pool.
    let h = harness(RAID);
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();
    let mut tasks = JoinSet::new();

    // Act
    for who in 0..50_u64 {
        let engine = h.engine.clone();
        tasks.spawn(async move {
            engine
                .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(who), 25)
                .await
                .unwrap()
        });
    }
    let mut total = 0;
    let mut fired = Vec::new();
    while let Some(outcome) = tasks.join_next().await {
        let (amount, milestones) = applied(&outcome.unwrap());
        total += amount;
        fired.extend(milestones);
    }

    // Assert
    fired.sort_unstable();
    assert_eq!(total, 1000);
    assert_eq!(fired, vec![50, 75, 100]);
    assert_eq!(raid_hp(&h).await, 0);
    for percent in [50, 75, 100] {
        let mut recipients = milestone_credits(&h, percent);
        let credited = recipients.len();
        recipients.dedup();
        assert!(credited > 0, "milestone {percent} paid nobody");
        assert_eq!(recipients.len(), credited, "milestone {percent} paid someone twice");
    }
    let status = h.engine.status(COMMUNITY).await.unwrap().unwrap();
    assert_eq!(status.participants, 40);
    assert_eq!(milestone_credits(&h, 100).len(), 40);
    assert_eq!(status.reached, vec![50, 75, 100]);
}

#[tokio::test]
async fn test_operator_progress_credits_no_participant() {
    let h = harness(RAID);
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();

    let outcome = h.engine.add_progress(COMMUNITY, 500).await.unwrap();

    assert_eq!(applied(&outcome), (500, vec![50]));
    let status = h.engine.status(COMMUNITY).await.unwrap().unwrap();
    assert_eq!(status.participants, 0);
    assert!(milestone_credits(&h, 50).is_empty());
}

#[tokio::test]
async fn test_rejections_leave_state_untouched() {
    // Arrange
    let h = harness(RAID);

    // Act
    let none = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(1), 10)
        .await
        .unwrap();
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();
    let mismatch = h
        .engine
        .contribute(COMMUNITY, "lantern_drive", ParticipantId(1), 10)
        .await
        .unwrap();
    let zero = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(1), 0)
        .await
        .unwrap();
    h.clock.advance(Duration::minutes(31));
    let expired = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(1), 10)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        none,
        ContributionOutcome::Rejected(Rejection::NoActiveEvent {
            community: COMMUNITY
        })
    );
    assert_eq!(
        mismatch,
        ContributionOutcome::Rejected(Rejection::EventMismatch {
            requested: "lantern_drive".to_owned(),
            active: "cthulhu_raid".to_owned()
        })
    );
    assert_eq!(zero, ContributionOutcome::Rejected(Rejection::InvalidAmount));
    assert!(matches!(
        expired,
        ContributionOutcome::Rejected(Rejection::NoActiveEvent { .. })
    ));
    let status = h.engine.status(COMMUNITY).await.unwrap().unwrap();
    assert_eq!(status.participants, 0);
}

#[tokio::test]
async fn test_failed_persist_applies_nothing() {
    // Arrange
    let h = harness(RAID);
    h.engine.start(COMMUNITY, "cthulhu_raid").await.unwrap();
    h.repo.fail_writes_with_prefix(Some("rally:active"));

    // Act
    let result = h
        .engine
        .contribute(COMMUNITY, "cthulhu_raid", ParticipantId(1), 600)
        .await;

    // Assert
    assert!(result.is_err());
    h.repo.fail_writes_with_prefix(None);
    let status = h.engine.status(COMMUNITY).await.unwrap().unwrap();
    assert_eq!(status.participants, 0);
    assert!(status.reached.is_empty());
    assert!(h.ledger.credits().is_empty());
}
