//! Per-key exclusive sections with a bounded wait.
//!
//! Each key (a space id, a lot id) gets its own async mutex, so work on
//! different keys never contends. Acquisition gives up after `timeout` and
//! reports [`DomainError::Busy`] instead of queueing forever.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::shared::errors::DomainError;

pub struct KeyedLocks {
    scope: &'static str,
    timeout: Duration,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Held for the duration of a critical section. Dropping it releases the key.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new(scope: &'static str, timeout: Duration) -> Self {
        Self {
            scope,
            timeout,
            locks: DashMap::new(),
        }
    }

    pub async fn acquire(&self, key: Uuid) -> Result<KeyGuard, DomainError> {
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(KeyGuard { _guard: guard }),
            Err(_) => {
                debug!(scope = self.scope, %key, "Lock wait timed out");
                metrics::counter!("parking_lock_timeouts_total", "scope" => self.scope)
                    .increment(1);
                Err(DomainError::Busy(format!(
                    "{} {} is locked by another request, retry later",
                    self.scope, key
                )))
            }
        }
    }

    /// Drop the mutex for a key nobody holds or waits on.
    pub fn forget(&self, key: &Uuid) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_times_out_as_busy() {
        let locks = KeyedLocks::new("space", Duration::from_millis(20));
        let key = Uuid::new_v4();

        let _held = locks.acquire(key).await.unwrap();
        let err = locks.acquire(key).await.err().unwrap();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyedLocks::new("space", Duration::from_millis(20));

        let _a = locks.acquire(Uuid::new_v4()).await.unwrap();
        let _b = locks.acquire(Uuid::new_v4()).await.unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_key_can_be_reacquired_and_forgotten() {
        let locks = KeyedLocks::new("lot", Duration::from_millis(20));
        let key = Uuid::new_v4();

        drop(locks.acquire(key).await.unwrap());
        drop(locks.acquire(key).await.unwrap());

        locks.forget(&key);
        assert!(locks.is_empty());
    }
}
