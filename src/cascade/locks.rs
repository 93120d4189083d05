//! Per-key async locks.
//!
//! Forward pull request creation is a check-then-create sequence against the
//! platform. Two merge events for the same (repository, source, destination)
//! arriving together would both see "no pull request" and both create one.
//! `KeyedLocks` serialises such sequences per key while leaving unrelated keys
//! fully concurrent.
//!
//! Each entry counts the tasks holding or waiting on it and is removed when
//! that count reaches zero, including when a waiting future is dropped.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus waiters; only changed under the map lock.
    users: usize,
}

/// A map of async mutexes created on demand.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    slots: Arc<Mutex<HashMap<K, Slot>>>,
}

impl<K: Eq + Hash + Clone> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        KeyedLocks {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        KeyedLocks {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds `key`, then holds it until the guard drops.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let mutex = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let slot = slots.entry(key.clone()).or_default();
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };

        // Built before waiting so a dropped wait still gives up its claim.
        let mut held = KeyedGuard {
            guard: None,
            key,
            slots: Arc::clone(&self.slots),
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Holds a key until dropped.
#[derive(Debug)]
pub struct KeyedGuard<K: Eq + Hash + Clone> {
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    slots: Arc<Mutex<HashMap<K, Slot>>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}
