//! Cooldown record storage.
//!
//! # Data Flow
//! ```text
//! admission guard
//!     → CooldownStore::check_and_record("lastWithdrawal:{identity}", now, window, mode)
//!         → redis.rs (Lua script, shared between instances)
//!         → memory.rs (DashMap entry, single instance)
//!         → serialized.rs (per-key lock over plain GET/SET)
//! ```
//!
//! # Persisted Layout
//! One record per identity: `lastWithdrawal:{identity}` → epoch-ms integer.
//! An odd value marks a grant already spent by a withdrawal; `/validate-ip`
//! writes even values that one later `/withdraw` may claim.

pub mod memory;
pub mod redis;
pub mod serialized;
pub mod types;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;
pub use self::serialized::SerializedStore;
pub use self::types::{
    evaluate, is_spent, CooldownOutcome, CooldownStore, GrantMode, KeyValueStore, StoreError,
    StoreResult, Transition,
};
