//! Rate-limited faucet withdrawal relay.
//!
//! An HTTP service that admits each caller at most once per cooldown window
//! and relays admitted withdrawals to a faucet contract from a custodial
//! account.

pub mod admission;
pub mod blockchain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use admission::{AdmissionGuard, CallerIdentity, Decision};
pub use blockchain::{RelayError, TransactionRelay};
pub use config::FaucetConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
