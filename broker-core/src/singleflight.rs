//! Per-key request collapsing.
//!
//! Callers about to do an expensive, idempotent fetch for a key take that
//! key's guard first, then re-check whatever cache they consult. The first
//! caller performs the fetch; the others wait on the guard and find the
//! fresh value on their re-check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct SingleFlight {
    guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `key` remains, then returns the guard.
    pub async fn acquire(&self, key: &str) -> FlightGuard {
        let lock = {
            let mut guards = self.lock_map();
            // Entries only the map references were left by waiters that
            // gave up before taking the lock.
            guards.retain(|_, lock| Arc::strong_count(lock) > 1);
            guards
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        FlightGuard {
            _guard: lock.lock_owned().await,
            key: key.to_string(),
            owner: self.clone(),
        }
    }

    /// Number of keys with a holder or waiter.
    pub fn in_flight(&self) -> usize {
        self.lock_map().len()
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.guards.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of one fetch; releases the key on drop.
pub struct FlightGuard {
    _guard: OwnedMutexGuard<()>,
    key: String,
    owner: SingleFlight,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut guards = self.owner.lock_map();
        // One reference lives in the map, one in our own guard. Anything
        // beyond that is a waiter which still needs the entry.
        guards.retain(|key, lock| {
            let floor = if *key == self.key { 2 } else { 1 };
            Arc::strong_count(lock) > floor
        });
    }
}
