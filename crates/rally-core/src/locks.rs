//! Per-key mutual exclusion.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async locks addressed by key.
///
/// Every read-modify-write of state owned by one key (a community, or one
/// participant's quest book) holds that key's guard for the whole sequence.
/// Different keys never contend. A key's slot lives only while someone holds
/// or awaits it.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. The guard releases on drop.
    pub async fn lock(&self, key: &K) -> KeyedGuard<'_, K> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        KeyedGuard {
            locks: self,
            key: key.clone(),
            _held: slot.lock_owned().await,
        }
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one key of a [`KeyedLocks`].
#[must_use = "the key is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct KeyedGuard<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: K,
    _held: OwnedMutexGuard<()>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        // The map and this guard own the only references: nobody is waiting.
        let mut slots = self.locks.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 2)
        {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        // Arrange
        let locks = KeyedLocks::new();
        let guard = locks.lock(&1_u64).await;

        // Act
        let second = tokio::time::timeout(Duration::from_millis(20), locks.lock(&1_u64)).await;

        // Assert
        assert!(second.is_err());
        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(20), locks.lock(&1_u64)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(&1_u64).await;

        let b = tokio::time::timeout(Duration::from_millis(20), locks.lock(&2_u64)).await;

        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_keys_are_forgotten() {
        // Arrange
        let locks = KeyedLocks::new();
        let a = locks.lock(&1_u64).await;
        let b = locks.lock(&2_u64).await;
        assert_eq!(locks.len(), 2);

        // Act
        drop(a);
        drop(b);

        // Assert
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_slot_outlives_holder_while_a_waiter_queues() {
        // Arrange
        let locks = Arc::new(KeyedLocks::new());
        let held = locks.lock(&1_u64).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(&1_u64).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Act
        drop(held);
        let during_handoff = locks.len();
        waiter.await.unwrap();

        // Assert
        assert_eq!(during_handoff, 1);
        assert!(locks.is_empty());
    }
}
