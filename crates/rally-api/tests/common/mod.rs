//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{FixedOffset, TimeZone, Utc};
use http_body_util::BodyExt;
use rally_core::ids::CommunityId;
use rally_events::application::config::EngineConfig;
use rally_events::application::engine::{Collaborators, EventEngine};
use rally_quests::application::tracker::QuestTracker;
use rally_registry::application::loader::load_from_str;
use rally_rewards::application::distributor::RewardDistributor;
use rally_state_store::pg_economy::{PgInventory, PgLedger};
use rally_state_store::pg_state_repository::PgStateRepository;
use rally_test_support::{FixedClock, MockRng, RecordingNotificationSink};
use sqlx::PgPool;
use tower::ServiceExt;

use rally_api::state::AppState;

pub const REGISTRY: &str = r"
events:
  kraken_raid:
    name: The Kraken
    schedule:
      probability: 1.0
      duration_minutes: 30
    kind:
      type: raid
      hp_goal: 500
    milestones:
      - percent: 50
        currency: 20
    rewards:
      first: { currency: 300, items: [{ key: kraken_scale, min: 1, max: 1 }] }
      participation: { currency: 40 }
    quests:
      daily_count: 1
      daily_pool:
        - { id: strike_2, action_type: strike, target: 2, reward: { currency: 60 } }
";

/// Build the full app router over Postgres collaborators with a fixed clock
/// and RNG. Uses the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> (Router, Arc<EventEngine>) {
    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    let repository = Arc::new(PgStateRepository::new(pool.clone()));
    let ledger = Arc::new(PgLedger::new(pool.clone()));
    let inventory = Arc::new(PgInventory::new(pool));
    let report = load_from_str(REGISTRY).unwrap();

    let engine = Arc::new(EventEngine::new(
        EngineConfig {
            communities: vec![CommunityId(1)],
            ..EngineConfig::default()
        },
        report.registry,
        Collaborators {
            repository: repository.clone(),
            ledger: ledger.clone(),
            inventory: inventory.clone(),
            notifier: Arc::new(RecordingNotificationSink::new()),
            clock: clock.clone(),
            rng: Box::new(MockRng),
        },
    ));
    let quests = QuestTracker::new(
        repository,
        Duration::from_secs(5),
        RewardDistributor::new(ledger, inventory),
        clock,
        Box::new(MockRng),
        FixedOffset::east_opt(0).unwrap(),
    );

    let app = rally_api::app(AppState::new(engine.clone(), Arc::new(quests)));
    (app, engine)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}
