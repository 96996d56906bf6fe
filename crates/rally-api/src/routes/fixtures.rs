//! In-memory application state for route tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{FixedOffset, TimeZone, Utc};
use rally_core::ids::CommunityId;
use rally_events::application::config::EngineConfig;
use rally_events::application::engine::{Collaborators, EventEngine};
use rally_quests::application::tracker::QuestTracker;
use rally_registry::application::loader::load_from_str;
use rally_rewards::application::distributor::RewardDistributor;
use rally_test_support::{
    InMemoryInventory, InMemoryLedger, InMemoryStateRepository, ManualClock, MockRng,
    RecordingNotificationSink,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::state::AppState;

pub(crate) const REGISTRY: &str = r"
events:
  cthulhu_raid:
    name: Cthulhu Rises
    schedule:
      probability: 0.0
      duration_minutes: 30
    effects:
      damage_bonus: 2.0
    kind:
      type: raid
      hp_goal: 100
    milestones:
      - percent: 50
        currency: 10
    rewards:
      participation: { currency: 50 }
    quests:
      daily_count: 1
      daily_pool:
        - { id: hit_3, action_type: hit, target: 3, reward: { currency: 15 } }
      fixed:
        - { id: hit_10, action_type: hit, target: 10, reward: { currency: 100 } }
  wishing_well:
    schedule:
      probability: 0.0
    kind:
      type: generic_action
      actions:
        - label: Toss a coin
          cost: { currency: 10 }
          daily_limit: 1
          rewards:
            - { rate: 1.0, currency: 25 }
";

pub(crate) struct TestApp {
    pub state: AppState,
    pub ledger: Arc<InMemoryLedger>,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryStateRepository::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let inventory = Arc::new(InMemoryInventory::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
        ));
        let report = load_from_str(REGISTRY).unwrap();
        assert!(report.issues.is_empty(), "{:?}", report.issues);

        let engine = EventEngine::new(
            EngineConfig {
                communities: vec![CommunityId(1)],
                ..EngineConfig::default()
            },
            report.registry,
            Collaborators {
                repository: repo.clone(),
                ledger: ledger.clone(),
                inventory: inventory.clone(),
                notifier: Arc::new(RecordingNotificationSink::new()),
                clock: clock.clone(),
                rng: Box::new(MockRng),
            },
        );
        let quests = QuestTracker::new(
            repo,
            Duration::from_secs(1),
            RewardDistributor::new(ledger.clone(), inventory.clone()),
            clock,
            Box::new(MockRng),
            FixedOffset::east_opt(0).unwrap(),
        );

        Self {
            state: AppState::new(Arc::new(engine), Arc::new(quests)),
            ledger,
        }
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub(crate) async fn post(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

pub(crate) async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
