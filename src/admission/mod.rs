//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → http::identity (derive CallerIdentity from the transport)
//!     → guard.rs (atomic check-and-record against the cooldown store)
//!     → Allowed: request proceeds to the relay
//!     → Denied: handled outcome, nothing written
//! ```
//!
//! # Design Decisions
//! - Fail closed: a store error or timeout is never Allowed
//! - The grant is recorded before Allowed is returned
//! - The decision is a precondition, not a lock held during relay

pub mod guard;
pub mod types;

pub use guard::{now_millis, AdmissionGuard, InfrastructureError};
pub use types::{CallerIdentity, Decision};
