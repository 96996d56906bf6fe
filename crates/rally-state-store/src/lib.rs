//! PostgreSQL implementations of the Rally collaborator traits.

pub mod pg_economy;
pub mod pg_state_repository;
pub mod schema;

use rally_core::error::EngineError;

/// Maps a driver error onto the engine's error split: pool exhaustion and
/// I/O hiccups are retryable, everything else is an infrastructure fault.
pub(crate) fn map_sqlx(err: sqlx::Error) -> EngineError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => EngineError::Transient(err.to_string()),
        other => EngineError::Infrastructure(other.to_string()),
    }
}

/// Converts an engine quantity to a database `BIGINT`.
pub(crate) fn to_db(value: u64) -> Result<i64, EngineError> {
    i64::try_from(value)
        .map_err(|_| EngineError::Infrastructure(format!("quantity {value} exceeds BIGINT")))
}

/// Converts a database `BIGINT` back to an engine quantity.
pub(crate) fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
