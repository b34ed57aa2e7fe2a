//! In-process cooldown store.
//!
//! Data is lost when the service restarts and is not shared between
//! instances. Suitable for development, tests and single-node deployments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::types::{evaluate, CooldownOutcome, CooldownStore, GrantMode, StoreResult};

/// A thread-safe map of key -> last grant (epoch ms).
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, u64>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a record.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.records.get(key).map(|r| *r.value())
    }

    /// Overwrite a record (seeding and administration).
    pub fn insert(&self, key: &str, last_granted_ms: u64) {
        self.records.insert(key.to_string(), last_granted_ms);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CooldownStore for MemoryStore {
    async fn check_and_record(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
        mode: GrantMode,
    ) -> StoreResult<CooldownOutcome> {
        // The entry holds the shard write lock across the check and the write.
        let entry = self.records.entry(key.to_string());
        let last = match &entry {
            Entry::Occupied(slot) => Some(*slot.get()),
            Entry::Vacant(_) => None,
        };

        let transition = evaluate(last, now_ms, window, mode);
        if let Some((value, _)) = transition.write {
            entry.insert(value);
        }
        Ok(transition.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);
    const CLAIM: GrantMode = GrantMode::Claim {
        claim_window: Duration::from_secs(10),
    };

    #[tokio::test]
    async fn test_grant_then_hold() {
        let store = MemoryStore::new();
        let now = 1_000_000;

        let first = store.check_and_record("k", now, WINDOW, GrantMode::Check).await.unwrap();
        assert_eq!(first, CooldownOutcome::Granted);
        assert_eq!(store.get("k"), Some(now));

        let second = store.check_and_record("k", now + 1_000, WINDOW, GrantMode::Check).await.unwrap();
        assert_eq!(second, CooldownOutcome::Held { last_granted_ms: now });
        // Denial does not write
        assert_eq!(store.get("k"), Some(now));
    }

    #[tokio::test]
    async fn test_expired_record_is_overwritten() {
        let store = MemoryStore::new();
        store.insert("k", 1_000);

        let later = 1_000 + 60_000;
        let outcome = store.check_and_record("k", later, WINDOW, GrantMode::Check).await.unwrap();
        assert_eq!(outcome, CooldownOutcome::Granted);
        assert_eq!(store.get("k"), Some(later));
    }

    #[tokio::test]
    async fn test_concurrent_single_grant() {
        let store = MemoryStore::new();
        let mut tasks = Vec::new();
        for i in 0..64u64 {
            let store = store.clone();
            // Checks and claims race for the same identity
            let mode = if i % 2 == 0 { GrantMode::Check } else { CLAIM };
            tasks.push(tokio::spawn(async move {
                store.check_and_record("same", 5_000 + i, WINDOW, mode).await.unwrap()
            }));
        }

        let (mut granted, mut claimed) = (0, 0);
        for task in tasks {
            match task.await.unwrap() {
                CooldownOutcome::Granted => granted += 1,
                CooldownOutcome::Claimed { .. } => claimed += 1,
                CooldownOutcome::Held { .. } => {}
            }
        }
        assert_eq!(granted, 1);
        assert!(claimed <= 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_spends_check_grant_once() {
        let store = MemoryStore::new();
        let now = 2_000_000;

        let check = store.check_and_record("k", now, WINDOW, GrantMode::Check).await.unwrap();
        assert_eq!(check, CooldownOutcome::Granted);

        let claim = store.check_and_record("k", now + 500, WINDOW, CLAIM).await.unwrap();
        assert_eq!(claim, CooldownOutcome::Claimed { granted_ms: now });
        assert_eq!(store.get("k"), Some(now + 1));

        let again = store.check_and_record("k", now + 900, WINDOW, CLAIM).await.unwrap();
        assert_eq!(again, CooldownOutcome::Held { last_granted_ms: now + 1 });
    }
}
