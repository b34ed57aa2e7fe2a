//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Read-only ledger call (fee level, estimate, nonce, receipt):
//!     → timeouts.rs (per-call deadline)
//!     → On transient failure: retries.rs (retry with backoff.rs delays)
//!
//! Broadcast:
//!     → per-call timeout only, never retried
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only where a repeat cannot move funds twice

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{retry_read_only, Retryable};
pub use timeouts::{with_deadline, Deadline};
