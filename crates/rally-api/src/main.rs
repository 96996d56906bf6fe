//! Rally API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use rally_api::error::AppError;
use rally_api::state::AppState;
use rally_core::clock::SystemClock;
use rally_core::notify::LogNotificationSink;
use rally_core::rng::OsSeededRng;
use rally_events::application::config::EngineConfig;
use rally_events::application::engine::{Collaborators, EventEngine};
use rally_events::application::scheduler::Scheduler;
use rally_quests::application::tracker::QuestTracker;
use rally_registry::application::loader::load_from_path;
use rally_rewards::application::distributor::RewardDistributor;
use rally_state_store::pg_economy::{PgInventory, PgLedger};
use rally_state_store::pg_state_repository::PgStateRepository;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Rally API server");

    // Read configuration from environment.
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
    let registry_path = std::env::var("RALLY_REGISTRY_PATH")
        .unwrap_or_else(|_| "config/events.yaml".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?;
    let config = EngineConfig::from_env()?;

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    // Load the event registry. Invalid definitions are skipped and logged.
    let report = load_from_path(std::path::Path::new(&registry_path))?;

    let repository = Arc::new(PgStateRepository::new(pool.clone()));
    let ledger = Arc::new(PgLedger::new(pool.clone()));
    let inventory = Arc::new(PgInventory::new(pool));
    let clock = Arc::new(SystemClock);

    let quests = QuestTracker::new(
        repository.clone(),
        config.persist_timeout,
        RewardDistributor::new(ledger.clone(), inventory.clone()),
        clock.clone(),
        Box::new(OsSeededRng::new()),
        config.utc_offset(),
    );
    let engine = Arc::new(
        EventEngine::new(
            config,
            report.registry,
            Collaborators {
                repository,
                ledger,
                inventory,
                notifier: Arc::new(LogNotificationSink),
                clock,
                rng: Box::new(OsSeededRng::new()),
            },
        )
        .with_registry_path(registry_path),
    );

    // Recover persisted runs before the first tick.
    engine.startup().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(Scheduler::new(engine.clone()).run(shutdown_rx));

    let app = rally_api::app(AppState::new(engine, Arc::new(quests)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;
    tracing::info!("Rally API server stopped");

    Ok(())
}
