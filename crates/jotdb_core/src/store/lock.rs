//! Per-collection lock registry.
//!
//! # Invariants
//! - One lock object per collection name for the registry lifetime.
//! - The registry mutex is held only for lookup-or-insert, never across a
//!   store operation.
//! - Entries are never removed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handle to one collection lock.
pub type CollectionLock = Arc<Mutex<()>>;

#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, CollectionLock>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `collection`, creating it on first touch.
    pub fn handle(&self, collection: &str) -> CollectionLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(collection) {
            return Arc::clone(lock);
        }
        let lock = CollectionLock::default();
        locks.insert(collection.to_string(), Arc::clone(&lock));
        lock
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Acquires `lock`, recovering from poisoning.
///
/// The lock guards no data, so a panic in a previous holder leaves nothing
/// inconsistent.
pub fn acquire(lock: &CollectionLock) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
