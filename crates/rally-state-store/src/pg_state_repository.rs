//! `PostgreSQL` implementation of the `StateRepository` trait.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use rally_core::error::EngineError;
use rally_core::repository::StateRepository;

use crate::map_sqlx;

/// PostgreSQL-backed key/value state repository.
#[derive(Debug, Clone)]
pub struct PgStateRepository {
    pool: PgPool,
}

impl PgStateRepository {
    /// Creates a new `PgStateRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateRepository for PgStateRepository {
    async fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>, EngineError> {
        let row = sqlx::query("SELECT value FROM engine_state WHERE state_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(|r| r.try_get::<serde_json::Value, _>("value"))
            .transpose()
            .map_err(map_sqlx)
    }

    async fn set_state(&self, key: &str, value: serde_json::Value) -> Result<(), EngineError> {
        sqlx::query(
            r"
            INSERT INTO engine_state (state_key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (state_key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_state(&self, key: &str) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM engine_state WHERE state_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
