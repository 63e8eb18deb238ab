//! Named async mutexes

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of mutexes addressed by string key, created on first use.
///
/// Callers that lock distinct keys never contend with each other.
#[derive(Debug, Default)]
pub struct MutexKv {
    store: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MutexKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the mutex named `key`; it is released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        tracing::debug!(key, "locking");
        let mutex = self.get(key);
        let guard = mutex.lock_owned().await;
        tracing::debug!(key, "locked");
        guard
    }

    fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let kv = Arc::new(MutexKv::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let kv = kv.clone();
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _guard = kv.lock("WafRetryer-us-east-1").await;
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let kv = MutexKv::new();
        let _east = kv.lock("WafRetryer-us-east-1").await;

        let west = tokio::time::timeout(Duration::from_millis(100), kv.lock("WafRetryer-us-west-2")).await;
        assert!(west.is_ok());
    }

    #[tokio::test]
    async fn waiter_is_woken_when_guard_drops() {
        let kv = MutexKv::new();
        let guard = kv.lock("WafRetryer-eu-west-1").await;

        let mut waiter = tokio_test::task::spawn(kv.lock("WafRetryer-eu-west-1"));
        tokio_test::assert_pending!(waiter.poll());

        drop(guard);
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }
}
