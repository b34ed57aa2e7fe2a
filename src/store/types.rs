//! Store trait definitions.
//!
//! Two interfaces:
//! - `CooldownStore`: atomic check-and-record, the only thing admission needs
//! - `KeyValueStore`: plain get/set, for stores without conditional writes
//!   (see `SerializedStore`)

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable or connection dropped.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Store reachable but the command failed.
    #[error("Store command error: {0}")]
    Command(String),

    /// Stored cooldown record is not an epoch-millisecond integer.
    #[error("Corrupt cooldown record at '{key}': {value}")]
    Corrupt { key: String, value: String },
}

impl StoreError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Connection(_) => "connection",
            StoreError::Command(_) => "command",
            StoreError::Corrupt { .. } => "corrupt",
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// What a check-and-record does with a live record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantMode {
    /// Grant only when no live record exists. The new grant is unspent.
    Check,
    /// Grant when no live record exists, or spend an unspent grant younger
    /// than `claim_window`. The record is left spent either way.
    Claim { claim_window: Duration },
}

impl GrantMode {
    /// Record value for a fresh grant at `now_ms`.
    ///
    /// The low bit of a record marks it spent by a withdrawal, so stamps are
    /// accurate to 2 ms.
    pub fn stamp(self, now_ms: u64) -> u64 {
        match self {
            GrantMode::Check => now_ms & !1,
            GrantMode::Claim { .. } => now_ms | 1,
        }
    }

    /// Claim window in milliseconds; 0 for plain checks.
    pub fn claim_window_ms(self) -> u64 {
        match self {
            GrantMode::Check => 0,
            GrantMode::Claim { claim_window } => duration_millis(claim_window),
        }
    }
}

/// Whether a record has already been spent by a withdrawal.
pub fn is_spent(record_ms: u64) -> bool {
    record_ms & 1 == 1
}

pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Result of an atomic check-and-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownOutcome {
    /// No live record; a new grant has been written.
    Granted,
    /// A live unspent grant has been marked spent.
    Claimed { granted_ms: u64 },
    /// A live record blocks the request; nothing was written.
    Held { last_granted_ms: u64 },
}

/// Outcome of [`evaluate`] plus the record to write, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub outcome: CooldownOutcome,
    /// New record value and its expiry.
    pub write: Option<(u64, Duration)>,
}

/// Decide from the previous record.
///
/// A record from the future (caller clock behind the writer's) counts as
/// inside the window.
pub fn evaluate(
    last_granted_ms: Option<u64>,
    now_ms: u64,
    window: Duration,
    mode: GrantMode,
) -> Transition {
    let fresh = Transition {
        outcome: CooldownOutcome::Granted,
        write: Some((mode.stamp(now_ms), window)),
    };
    let Some(last) = last_granted_ms else {
        return fresh;
    };

    let age = now_ms.checked_sub(last);
    if matches!(age, Some(age) if u128::from(age) >= window.as_millis()) {
        return fresh;
    }

    if let GrantMode::Claim { claim_window } = mode {
        let recent = age.map_or(true, |age| u128::from(age) < claim_window.as_millis());
        if recent && !is_spent(last) {
            let remaining = age.map_or(window, |age| {
                window.saturating_sub(Duration::from_millis(age))
            });
            return Transition {
                outcome: CooldownOutcome::Claimed { granted_ms: last },
                write: Some((last | 1, remaining)),
            };
        }
    }

    Transition {
        outcome: CooldownOutcome::Held {
            last_granted_ms: last,
        },
        write: None,
    }
}

/// Store offering an atomic conditional write of cooldown records.
///
/// Implementations:
/// - `RedisStore` - server-side script, shared across instances
/// - `MemoryStore` - process-local map
/// - `SerializedStore` - per-key locks over any `KeyValueStore`
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Apply [`evaluate`] to the record under `key` and write its result,
    /// as one linearizable operation.
    async fn check_and_record(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
        mode: GrantMode,
    ) -> StoreResult<CooldownOutcome>;
}

/// Plain key-value store without conditional writes.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set `key`, with an optional expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;
}
