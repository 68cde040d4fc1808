//! Per-name async locks

use crate::Area;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<(Area, String), Arc<Mutex<()>>>;

/// Serializes mutations of a single `(area, name)` pair.
///
/// Entries are created on demand and dropped again once no task holds or
/// waits for them, so the map only grows with the number of names in flight.
#[derive(Default)]
pub(crate) struct NameLocks {
    locks: Arc<LockMap>,
}

pub(crate) struct NameGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: (Area, String),
    locks: Arc<LockMap>,
}

impl NameLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, area: Area, name: &str) -> NameGuard {
        let key = (area, name.to_string());
        let mutex = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = mutex.lock_owned().await;

        NameGuard {
            guard: Some(guard),
            key,
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map itself still references the mutex: nobody is waiting
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
