//! Per-case serialization of amendments within one process.
//!
//! Each case name maps to an async mutex that is held across the whole
//! load-to-audit span of an amendment. Different cases never contend.
//! The registry itself sits behind a `parking_lot` mutex that is only held
//! while looking up an entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct CaseLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `case`.
    pub async fn acquire(&self, case: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Entries nobody holds or waits on can go.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(case.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of cases with a held or awaited lock.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
