//! Test repositories — `StateRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rally_core::error::EngineError;
use rally_core::repository::StateRepository;
use serde_json::Value;

/// A key/value store held in memory. Writes to keys starting with a
/// configured prefix can be made to fail.
#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    values: Mutex<HashMap<String, Value>>,
    failing_prefix: Mutex<Option<String>>,
    writes: Mutex<Vec<String>>,
}

impl InMemoryStateRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without recording a write.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, key: &str, value: Value) {
        self.values.lock().unwrap().insert(key.to_owned(), value);
    }

    /// Read a value directly.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    /// All keys currently stored, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys passed to `set_state`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Make `set_state` fail for keys starting with `prefix`. `None` clears it.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_writes_with_prefix(&self, prefix: Option<&str>) {
        *self.failing_prefix.lock().unwrap() = prefix.map(str::to_owned);
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn get_state(&self, key: &str) -> Result<Option<Value>, EngineError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: Value) -> Result<(), EngineError> {
        if let Some(prefix) = self.failing_prefix.lock().unwrap().as_deref()
            && key.starts_with(prefix)
        {
            return Err(EngineError::Infrastructure("write refused".into()));
        }
        self.writes.lock().unwrap().push(key.to_owned());
        self.values.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete_state(&self, key: &str) -> Result<(), EngineError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A repository that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingStateRepository;

#[async_trait]
impl StateRepository for FailingStateRepository {
    async fn get_state(&self, _key: &str) -> Result<Option<Value>, EngineError> {
        Err(EngineError::Infrastructure("connection refused".into()))
    }

    async fn set_state(&self, _key: &str, _value: Value) -> Result<(), EngineError> {
        Err(EngineError::Infrastructure("connection refused".into()))
    }

    async fn delete_state(&self, _key: &str) -> Result<(), EngineError> {
        Err(EngineError::Infrastructure("connection refused".into()))
    }
}

/// A repository whose calls never complete. Used to exercise persistence
/// timeouts.
#[derive(Debug)]
pub struct StallingStateRepository;

#[async_trait]
impl StateRepository for StallingStateRepository {
    async fn get_state(&self, _key: &str) -> Result<Option<Value>, EngineError> {
        std::future::pending().await
    }

    async fn set_state(&self, _key: &str, _value: Value) -> Result<(), EngineError> {
        std::future::pending().await
    }

    async fn delete_state(&self, _key: &str) -> Result<(), EngineError> {
        std::future::pending().await
    }
}
