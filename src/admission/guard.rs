//! Per-identity withdrawal cooldown.
//!
//! One grant per identity per window. The store decides atomically; the
//! guard adds the key layout, the deadline and the fail-closed error mapping.
//!
//! `admit` is the standalone check behind `/validate-ip`: it records an
//! unspent grant. `claim` runs for `/withdraw`: it takes a fresh grant, or
//! spends one left by `admit` within the claim window. Each grant pays out
//! at most once.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::time::timeout;

use crate::admission::types::{CallerIdentity, Decision};
use crate::config::AdmissionConfig;
use crate::observability::metrics;
use crate::store::{CooldownOutcome, CooldownStore, GrantMode, StoreError};

/// Store failure during an admission check. Never an Allowed.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Admission guard over a shared cooldown store.
#[derive(Clone)]
pub struct AdmissionGuard {
    store: Arc<dyn CooldownStore>,
    window: Duration,
    claim_window: Duration,
    key_prefix: String,
    store_timeout: Duration,
}

impl AdmissionGuard {
    pub fn new(store: Arc<dyn CooldownStore>, config: &AdmissionConfig) -> Self {
        Self {
            store,
            window: Duration::from_secs(config.cooldown_secs),
            claim_window: Duration::from_secs(config.claim_window_secs),
            key_prefix: config.key_prefix.clone(),
            store_timeout: Duration::from_millis(config.store_timeout_ms),
        }
    }

    /// Configured cooldown window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Store key holding the identity's last grant.
    pub fn record_key(&self, identity: &CallerIdentity) -> String {
        format!("{}{}", self.key_prefix, identity)
    }

    /// Check-and-record with the configured window at the current time.
    pub async fn admit(&self, identity: &CallerIdentity) -> Result<Decision, InfrastructureError> {
        self.check_and_record(identity, now_millis(), self.window, GrantMode::Check)
            .await
    }

    /// Admission for a withdrawal: a fresh grant, or the unspent grant of a
    /// recent `admit`.
    pub async fn claim(&self, identity: &CallerIdentity) -> Result<Decision, InfrastructureError> {
        let mode = GrantMode::Claim {
            claim_window: self.claim_window,
        };
        self.check_and_record(identity, now_millis(), self.window, mode)
            .await
    }

    /// Grant if `identity` has no grant younger than `window` as of `now_ms`
    /// (or, when claiming, an unspent one), recording before returning.
    pub async fn check_and_record(
        &self,
        identity: &CallerIdentity,
        now_ms: u64,
        window: Duration,
        mode: GrantMode,
    ) -> Result<Decision, InfrastructureError> {
        let key = self.record_key(identity);
        let call = self.store.check_and_record(&key, now_ms, window, mode);

        let outcome = match timeout(self.store_timeout, call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::error!(identity = %identity, error = %e, "Cooldown store error");
                metrics::record_store_error(e.kind());
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!(
                    identity = %identity,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Cooldown store timeout"
                );
                metrics::record_store_error("timeout");
                return Err(InfrastructureError::Timeout(self.store_timeout));
            }
        };

        let decision = match outcome {
            CooldownOutcome::Granted => Decision::Allowed,
            CooldownOutcome::Claimed { granted_ms } => {
                tracing::debug!(
                    identity = %identity,
                    age_ms = now_ms.saturating_sub(granted_ms),
                    "Claimed admission grant"
                );
                Decision::Allowed
            }
            CooldownOutcome::Held { last_granted_ms } => {
                let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
                let ends_at = last_granted_ms.saturating_add(window_ms);
                Decision::Denied {
                    retry_after: Duration::from_millis(ends_at.saturating_sub(now_ms)),
                }
            }
        };

        match decision {
            Decision::Allowed => tracing::info!(identity = %identity, "Withdrawal allowed"),
            Decision::Denied { retry_after } => tracing::info!(
                identity = %identity,
                retry_after_secs = retry_after.as_secs(),
                "Withdrawal denied: recent withdrawal"
            ),
        }
        metrics::record_admission(&decision);

        Ok(decision)
    }
}

impl std::fmt::Debug for AdmissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGuard")
            .field("window", &self.window)
            .field("claim_window", &self.claim_window)
            .field("key_prefix", &self.key_prefix)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreResult};
    use async_trait::async_trait;

    const HOUR_MS: u64 = 60 * 60 * 1000;
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    struct DownStore;

    #[async_trait]
    impl CooldownStore for DownStore {
        async fn check_and_record(
            &self,
            _: &str,
            _: u64,
            _: Duration,
            _: GrantMode,
        ) -> StoreResult<CooldownOutcome> {
            Err(StoreError::Connection("connection refused".to_string()))
        }
    }

    struct HangingStore;

    #[async_trait]
    impl CooldownStore for HangingStore {
        async fn check_and_record(
            &self,
            _: &str,
            _: u64,
            _: Duration,
            _: GrantMode,
        ) -> StoreResult<CooldownOutcome> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(CooldownOutcome::Granted)
        }
    }

    fn guard_with(store: Arc<dyn CooldownStore>) -> AdmissionGuard {
        let mut config = AdmissionConfig::default();
        config.store_timeout_ms = 50;
        AdmissionGuard::new(store, &config)
    }

    fn ip() -> CallerIdentity {
        CallerIdentity::new("1.2.3.4")
    }

    #[tokio::test]
    async fn test_first_request_allowed_and_recorded() {
        let store = MemoryStore::new();
        let guard = guard_with(Arc::new(store.clone()));
        let now = now_millis();

        let decision = guard.check_and_record(&ip(), now, DAY, GrantMode::Check).await.unwrap();
        assert_eq!(decision, Decision::Allowed);
        assert_eq!(store.get("lastWithdrawal:1.2.3.4"), Some(now & !1));
    }

    #[tokio::test]
    async fn test_recent_grant_denied() {
        let store = MemoryStore::new();
        let now = now_millis();
        store.insert("lastWithdrawal:1.2.3.4", now - HOUR_MS);
        let guard = guard_with(Arc::new(store.clone()));

        let decision = guard.check_and_record(&ip(), now, DAY, GrantMode::Check).await.unwrap();
        assert_eq!(
            decision,
            Decision::Denied { retry_after: Duration::from_millis(23 * HOUR_MS) }
        );
        assert_eq!(store.get("lastWithdrawal:1.2.3.4"), Some(now - HOUR_MS));
    }

    #[tokio::test]
    async fn test_expired_grant_allowed_and_updated() {
        let store = MemoryStore::new();
        let now = now_millis();
        store.insert("lastWithdrawal:1.2.3.4", now - 25 * HOUR_MS);
        let guard = guard_with(Arc::new(store.clone()));

        let decision = guard.check_and_record(&ip(), now, DAY, GrantMode::Check).await.unwrap();
        assert_eq!(decision, Decision::Allowed);
        assert_eq!(store.get("lastWithdrawal:1.2.3.4"), Some(now & !1));
    }

    #[tokio::test]
    async fn test_admit_uses_configured_window() {
        let guard = guard_with(Arc::new(MemoryStore::new()));
        assert_eq!(guard.window(), DAY);
        assert!(guard.admit(&ip()).await.unwrap().is_allowed());
        assert!(!guard.admit(&ip()).await.unwrap().is_allowed());
        // Other identities are unaffected
        let other = CallerIdentity::new("5.6.7.8");
        assert!(guard.admit(&other).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_claim_follows_admit_once() {
        let store = MemoryStore::new();
        let guard = guard_with(Arc::new(store.clone()));

        assert!(guard.admit(&ip()).await.unwrap().is_allowed());
        assert!(guard.claim(&ip()).await.unwrap().is_allowed());
        assert!(!guard.claim(&ip()).await.unwrap().is_allowed());
        assert!(!guard.admit(&ip()).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_claim_without_admit_spends_fresh_grant() {
        let guard = guard_with(Arc::new(MemoryStore::new()));

        assert!(guard.claim(&ip()).await.unwrap().is_allowed());
        assert!(!guard.admit(&ip()).await.unwrap().is_allowed());
        assert!(!guard.claim(&ip()).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_stale_admit_grant_not_claimable() {
        let store = MemoryStore::new();
        // Unspent, but older than the claim window
        store.insert("lastWithdrawal:1.2.3.4", (now_millis() - HOUR_MS) & !1);
        let guard = guard_with(Arc::new(store));

        let decision = guard.claim(&ip()).await.unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn test_store_down_fails_closed() {
        let guard = guard_with(Arc::new(DownStore));
        let result = guard.admit(&ip()).await;
        assert!(matches!(
            result,
            Err(InfrastructureError::Store(StoreError::Connection(_)))
        ));
    }

    #[tokio::test]
    async fn test_store_timeout_fails_closed() {
        let guard = guard_with(Arc::new(HangingStore));
        let result = guard.admit(&ip()).await;
        assert!(matches!(result, Err(InfrastructureError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_concurrent_same_identity() {
        let guard = guard_with(Arc::new(MemoryStore::new()));
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let guard = guard.clone();
            tasks.push(tokio::spawn(async move { guard.admit(&ip()).await.unwrap() }));
        }

        let mut allowed = 0;
        for task in tasks {
            if task.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
    }
}
