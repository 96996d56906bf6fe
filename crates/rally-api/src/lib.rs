//! Rally — HTTP surface.
//!
//! Operator commands, participant calls and quest endpoints over the event
//! engine. Business rejections come back as 409/422 with a machine-readable
//! code.

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// The full application router, as served by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1",
            routes::operator::router().merge(routes::participation::router()),
        )
        .nest("/api/v1/quests", routes::quests::router())
        .with_state(state)
}
