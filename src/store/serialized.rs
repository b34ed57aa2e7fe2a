//! Check-and-record over a plain key-value store.
//!
//! A per-key async mutex is held across the read and the write. Only
//! linearizable when this process is the sole writer of the keys.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::store::types::{
    evaluate, CooldownOutcome, CooldownStore, GrantMode, KeyValueStore, StoreError, StoreResult,
};

/// Serializes check-and-record per key over any `KeyValueStore`.
pub struct SerializedStore<S> {
    inner: S,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: KeyValueStore> SerializedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locks: DashMap::new(),
        }
    }

    /// Number of keys with a lock currently held or awaited.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    async fn check_then_write(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
        mode: GrantMode,
    ) -> StoreResult<CooldownOutcome> {
        let last = match self.inner.get(key).await? {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                value: raw.clone(),
            })?),
            None => None,
        };

        let transition = evaluate(last, now_ms, window, mode);
        if let Some((value, ttl)) = transition.write {
            self.inner.set(key, &value.to_string(), Some(ttl)).await?;
        }
        Ok(transition.outcome)
    }
}

/// Holds a key's lock handle; prunes the map entry when the last user leaves,
/// including when the owning future is dropped mid-operation.
struct KeyLease<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        // Two references left means the map and this lease.
        self.locks.remove_if(self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

#[async_trait]
impl<S: KeyValueStore> CooldownStore for SerializedStore<S> {
    async fn check_and_record(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
        mode: GrantMode,
    ) -> StoreResult<CooldownOutcome> {
        let lease = KeyLease {
            locks: &self.locks,
            key,
            lock: self.locks.entry(key.to_string()).or_default().clone(),
        };
        let _held = lease.lock.lock().await;
        self.check_then_write(key, now_ms, window, mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Non-atomic store that yields between read and write.
    #[derive(Default)]
    struct SlowKv {
        values: std::sync::Mutex<HashMap<String, String>>,
        sets: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for SlowKv {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            let value = self.values.lock().unwrap().get(key).cloned();
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> StoreResult<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    const WINDOW: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_concurrent_single_grant() {
        let store = Arc::new(SerializedStore::new(SlowKv::default()));
        let mut tasks = Vec::new();
        for i in 0..16u64 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.check_and_record("ip", 10_000 + i, WINDOW, GrantMode::Check).await.unwrap()
            }));
        }

        let mut granted = 0;
        for task in tasks {
            if task.await.unwrap() == CooldownOutcome::Granted {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
        assert_eq!(store.inner.sets.load(Ordering::SeqCst), 1);
        assert_eq!(store.active_locks(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_independent() {
        let store = SerializedStore::new(SlowKv::default());
        let a = store.check_and_record("a", 1, WINDOW, GrantMode::Check).await.unwrap();
        let b = store.check_and_record("b", 1, WINDOW, GrantMode::Check).await.unwrap();
        assert_eq!(a, CooldownOutcome::Granted);
        assert_eq!(b, CooldownOutcome::Granted);
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let kv = SlowKv::default();
        kv.values
            .lock()
            .unwrap()
            .insert("ip".to_string(), "yesterday".to_string());
        let store = SerializedStore::new(kv);

        let err = store.check_and_record("ip", 1, WINDOW, GrantMode::Check).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(store.active_locks(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_call_releases_lock() {
        let store = Arc::new(SerializedStore::new(SlowKv::default()));
        let pending = store.check_and_record("ip", 1, WINDOW, GrantMode::Check);
        let _ = tokio::time::timeout(Duration::from_millis(1), pending).await;

        assert_eq!(store.active_locks(), 0);
        let outcome = store.check_and_record("ip", 2, WINDOW, GrantMode::Check).await.unwrap();
        assert_eq!(outcome, CooldownOutcome::Granted);
    }

    #[tokio::test]
    async fn test_claim_marks_record_spent() {
        let store = SerializedStore::new(SlowKv::default());
        let claim = GrantMode::Claim {
            claim_window: Duration::from_secs(60),
        };

        store.check_and_record("ip", 10_000, WINDOW, GrantMode::Check).await.unwrap();
        let outcome = store.check_and_record("ip", 40_000, WINDOW, claim).await.unwrap();
        assert_eq!(outcome, CooldownOutcome::Claimed { granted_ms: 10_000 });

        let values = store.inner.values.lock().unwrap();
        assert_eq!(values.get("ip").map(String::as_str), Some("10001"));
        assert_eq!(store.inner.sets.load(Ordering::SeqCst), 2);
    }
}
