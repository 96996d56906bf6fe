//! Persistence collaborator abstraction.
//!
//! The engine only needs a durable key/value store; serialization of typed
//! state lives one layer up.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::EngineError;

/// Durable key/value persistence.
///
/// Implementations must make each call atomic. Lost-update protection comes
/// from the engine serializing all read-modify-write sequences for a
/// community through a single lock.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Load the value stored under `key`, if any.
    async fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>, EngineError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_state(&self, key: &str, value: serde_json::Value) -> Result<(), EngineError>;

    /// Remove the value stored under `key`. Removing a missing key succeeds.
    async fn delete_state(&self, key: &str) -> Result<(), EngineError>;
}

/// Wraps a repository so every call fails with `EngineError::Transient`
/// instead of hanging past `timeout`.
pub struct TimedStateRepository {
    inner: Arc<dyn StateRepository>,
    timeout: Duration,
}

impl TimedStateRepository {
    /// Bounds every call on `inner` by `timeout`.
    #[must_use]
    pub fn new(inner: Arc<dyn StateRepository>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = Result<T, EngineError>> + Send,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, key, timeout = ?self.timeout, "persistence call timed out");
                Err(EngineError::Transient(format!(
                    "{op} {key} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl StateRepository for TimedStateRepository {
    async fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>, EngineError> {
        self.bounded("get_state", key, self.inner.get_state(key))
            .await
    }

    async fn set_state(&self, key: &str, value: serde_json::Value) -> Result<(), EngineError> {
        self.bounded("set_state", key, self.inner.set_state(key, value))
            .await
    }

    async fn delete_state(&self, key: &str) -> Result<(), EngineError> {
        self.bounded("delete_state", key, self.inner.delete_state(key))
            .await
    }
}

/// Loads and decodes the value under `key`.
///
/// # Errors
///
/// Returns the repository's error, or `EngineError::Serialization` if the
/// stored value does not decode as `T`.
pub async fn load_typed<T: DeserializeOwned>(
    repo: &dyn StateRepository,
    key: &str,
) -> Result<Option<T>, EngineError> {
    match repo.get_state(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encodes and stores `value` under `key`.
///
/// # Errors
///
/// Returns the repository's error, or `EngineError::Serialization` if `value`
/// does not encode.
pub async fn save_typed<T: Serialize + Sync>(
    repo: &dyn StateRepository,
    key: &str,
    value: &T,
) -> Result<(), EngineError> {
    repo.set_state(key, serde_json::to_value(value)?).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MapRepository(Mutex<HashMap<String, serde_json::Value>>);

    #[async_trait]
    impl StateRepository for MapRepository {
        async fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>, EngineError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn set_state(&self, key: &str, value: serde_json::Value) -> Result<(), EngineError> {
            self.0.lock().unwrap().insert(key.to_owned(), value);
            Ok(())
        }

        async fn delete_state(&self, key: &str) -> Result<(), EngineError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct Stalling;

    #[async_trait]
    impl StateRepository for Stalling {
        async fn get_state(&self, _key: &str) -> Result<Option<serde_json::Value>, EngineError> {
            std::future::pending().await
        }

        async fn set_state(&self, _key: &str, _value: serde_json::Value) -> Result<(), EngineError> {
            std::future::pending().await
        }

        async fn delete_state(&self, _key: &str) -> Result<(), EngineError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_call_maps_to_transient() {
        // Arrange
        let repo = TimedStateRepository::new(Arc::new(Stalling), Duration::from_millis(10));

        // Act
        let result = repo.get_state("rally:active:1").await;

        // Assert
        let err = result.unwrap_err();
        assert!(err.is_retryable(), "expected transient error, got {err:?}");
    }

    #[tokio::test]
    async fn test_typed_round_trip_through_timed_repository() {
        // Arrange
        let repo = TimedStateRepository::new(
            Arc::new(MapRepository::default()),
            Duration::from_secs(1),
        );

        // Act
        save_typed(&repo, "counter", &7_u32).await.unwrap();
        let loaded: Option<u32> = load_typed(&repo, "counter").await.unwrap();
        let missing: Option<u32> = load_typed(&repo, "other").await.unwrap();

        // Assert
        assert_eq!(loaded, Some(7));
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_a_serialization_error() {
        let repo = MapRepository::default();
        repo.set_state("counter", serde_json::json!("seven"))
            .await
            .unwrap();

        let result: Result<Option<u32>, _> = load_typed(&repo, "counter").await;

        assert!(matches!(result, Err(EngineError::Serialization(_))));
    }
}
