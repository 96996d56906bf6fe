//! Shared harness for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rally_core::ids::CommunityId;
use rally_core::repository::StateRepository;
use rally_core::rng::DeterministicRng;
use rally_events::application::config::EngineConfig;
use rally_events::application::engine::{Collaborators, EventEngine};
use rally_registry::application::loader::load_from_str;
use rally_test_support::{
    InMemoryInventory, InMemoryLedger, InMemoryStateRepository, ManualClock, MockRng,
    RecordingNotificationSink,
};

pub const COMMUNITY: CommunityId = CommunityId(1);

/// Thursday 2026-01-15 12:00 UTC.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
}

pub const RAID: &str = r"
events:
  cthulhu_raid:
    name: Cthulhu Rises
    priority: 10
    schedule:
      cooldown_minutes: 60
      probability: 1.0
      duration_minutes: 30
    kind:
      type: raid
      hp_goal: 1000
    milestones:
      - percent: 50
        currency: 10
        announcement: Halfway there
      - percent: 75
        currency: 15
      - percent: 100
        currency: 20
    rewards:
      first: { currency: 300 }
      second: { currency: 200 }
      third: { currency: 100 }
      participation: { currency: 50 }
      fail: { currency: 5 }
";

pub const COLLECTION: &str = r"
events:
  lantern_drive:
    name: Lantern Drive
    schedule:
      probability: 1.0
      duration_minutes: 60
    kind:
      type: collection_quest
      goal: 10
    rewards:
      first: { currency: 30 }
      participation: { currency: 10 }
";

pub const WISHING_WELL: &str = r#"
events:
  wishing_well:
    name: Wishing Well
    schedule:
      probability: 1.0
      duration_minutes: 4320
    effects:
      catch_rate: 1.5
    kind:
      type: generic_action
      actions:
        - label: Toss a coin
          cost: { currency: 100 }
          daily_limit: 2
          rewards:
            - { rate: 0.5, currency: 250 }
        - label: Offer a pearl
          cost: { item: { key: pearl, qty: 1 } }
          rewards:
            - { rate: 1.0, items: [{ key: wish, min: 1, max: 1 }] }
        - label: Feed the koi
          cost:
            item_type: { name: fish, members: [carp, trout], qty: 3 }
          rewards:
            - { rate: 1.0, currency: 40 }
          message: The koi are pleased.
          public_message: "{participant} fed the koi and got {rewards}"
        - label: Peer into the depths
          rewards:
            - { rate: 0.0, currency: 1000, fail_message: Only darkness looks back. }
  cthulhu_raid:
    schedule:
      probability: 0.0
    kind:
      type: raid
      hp_goal: 10
"#;

pub struct Harness {
    pub engine: Arc<EventEngine>,
    pub repo: Arc<InMemoryStateRepository>,
    pub ledger: Arc<InMemoryLedger>,
    pub inventory: Arc<InMemoryInventory>,
    pub notifier: Arc<RecordingNotificationSink>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Another engine over the same collaborators, as after a restart.
    pub fn restart(&self, registry: &str) -> Arc<EventEngine> {
        build_engine(
            registry,
            self.repo.clone(),
            self.ledger.clone(),
            self.inventory.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            Box::new(MockRng),
        )
    }
}

pub fn harness(registry: &str) -> Harness {
    harness_with_rng(registry, Box::new(MockRng))
}

pub fn harness_with_rng(registry: &str, rng: Box<dyn DeterministicRng>) -> Harness {
    let repo = Arc::new(InMemoryStateRepository::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let inventory = Arc::new(InMemoryInventory::new());
    let notifier = Arc::new(RecordingNotificationSink::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = build_engine(
        registry,
        repo.clone(),
        ledger.clone(),
        inventory.clone(),
        notifier.clone(),
        clock.clone(),
        rng,
    );
    Harness {
        engine,
        repo,
        ledger,
        inventory,
        notifier,
        clock,
    }
}

pub fn config() -> EngineConfig {
    EngineConfig {
        communities: vec![COMMUNITY],
        ..EngineConfig::default()
    }
}

pub fn engine_over(registry: &str, repository: Arc<dyn StateRepository>, config: EngineConfig) -> EventEngine {
    let report = load_from_str(registry).unwrap();
    assert!(report.issues.is_empty(), "{:?}", report.issues);
    EventEngine::new(
        config,
        report.registry,
        Collaborators {
            repository,
            ledger: Arc::new(InMemoryLedger::new()),
            inventory: Arc::new(InMemoryInventory::new()),
            notifier: Arc::new(RecordingNotificationSink::new()),
            clock: Arc::new(ManualClock::new(start_time())),
            rng: Box::new(MockRng),
        },
    )
}

fn build_engine(
    registry: &str,
    repo: Arc<InMemoryStateRepository>,
    ledger: Arc<InMemoryLedger>,
    inventory: Arc<InMemoryInventory>,
    notifier: Arc<RecordingNotificationSink>,
    clock: Arc<ManualClock>,
    rng: Box<dyn DeterministicRng>,
) -> Arc<EventEngine> {
    let report = load_from_str(registry).unwrap();
    assert!(report.issues.is_empty(), "{:?}", report.issues);
    Arc::new(EventEngine::new(
        config(),
        report.registry,
        Collaborators {
            repository: repo,
            ledger,
            inventory,
            notifier,
            clock,
            rng,
        },
    ))
}
